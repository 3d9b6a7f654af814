// src/remote/mod.rs

//! Remote queue layer.
//!
//! The scheduler talks to a [`QueueClient`] instead of a concrete task
//! backend. This makes it easy to swap in a fake client in tests while
//! keeping the production backend implementation in [`local`].
//!
//! - [`LocalQueueClient`] is the default implementation used by `planloop`.
//!   It executes step commands as OS processes, bounded per queue.
//! - Tests can provide their own `QueueClient` that, for example, records
//!   which steps were submitted and scripts their outcomes.

pub mod events;
pub mod local;
pub mod worker;

pub use events::{decode_event_line, encode_event_line, EVENT_LINE_MARKER};
pub use local::LocalQueueClient;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::types::{QueueName, StepId};

/// Opaque reference to a step's in-flight remote execution.
///
/// A handle is associated 1:1 with exactly one submitted step; once the
/// result is fetched (or the submission is revoked and observed), the handle
/// is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// One event emitted by a finished step execution, in emission order.
///
/// These are the decoded worker results the poller forwards to the
/// execution plan's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    Succeeded {
        step: StepId,
    },
    Failed {
        step: StepId,
        message: String,
        trace: Option<String>,
    },
}

impl StepEvent {
    /// The step this event belongs to.
    pub fn step(&self) -> &str {
        match self {
            StepEvent::Succeeded { step } => step,
            StepEvent::Failed { step, .. } => step,
        }
    }
}

/// Result of fetching a ready handle.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The step ran to completion and emitted these events.
    Completed(Vec<StepEvent>),
    /// The submission was revoked before (or while) running; there are no
    /// events and the step is dropped from further consideration.
    Revoked,
}

/// The submit call itself failed; the step never started remotely.
#[derive(Error, Debug)]
#[error("submission to queue '{queue}' failed: {message}")]
pub struct SubmitError {
    pub queue: QueueName,
    pub message: String,
}

/// Result retrieval failed after the step reportedly finished. Whether the
/// step's side effects happened is unknown.
#[derive(Error, Debug)]
#[error("result fetch failed: {0}")]
pub struct FetchError(pub String);

/// Payload handed to the queue backend for one step execution attempt.
#[derive(Debug, Clone)]
pub struct StepPayload {
    pub step: StepId,
    pub cmd: String,
}

/// Trait abstracting the distributed task backend.
///
/// Production code uses [`LocalQueueClient`]; tests can provide their own
/// implementation that doesn't spawn real processes. All methods are
/// non-blocking from the scheduler's point of view: `poll_ready` never
/// waits for a result, and `revoke` is best-effort and infallible.
pub trait QueueClient: Send {
    /// Submit a step to the named queue, returning a handle to poll.
    fn submit(
        &mut self,
        queue: QueueName,
        payload: StepPayload,
    ) -> Pin<Box<dyn Future<Output = Result<Handle, SubmitError>> + Send + '_>>;

    /// Whether the handle's result can be fetched without waiting.
    fn poll_ready(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Fetch the result of a ready handle, consuming it.
    fn fetch(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + '_>>;

    /// Ask the backend to stop executing the handle's step. Best-effort;
    /// the revocation (if it lands) is observed later via `fetch`.
    fn revoke(&mut self, handle: Handle) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}
