// src/remote/local.rs

//! In-process queue backend executing step commands as OS processes.
//!
//! Each named queue is bounded by a semaphore sized from the plan's
//! `[queue.<name>] workers` setting; a submitted step waits for a permit,
//! runs its command via [`worker::run_step_process`], and parks its result
//! until the scheduler fetches it. Revocation cancels the waiting or
//! running process and leaves a `Revoked` outcome behind.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, error};

use crate::config::model::default_workers;
use crate::config::PlanFile;
use crate::remote::worker::{self, ProcessOutcome};
use crate::remote::{
    FetchError, FetchOutcome, Handle, QueueClient, StepPayload, SubmitError,
};
use crate::types::QueueName;

/// Where a submitted step currently is, as seen through its handle.
#[derive(Debug)]
enum SlotState {
    Running,
    Finished(Vec<crate::remote::StepEvent>),
    /// The backend itself failed (spawn error, queue shutdown); distinct
    /// from the step reporting failure through its events.
    Faulted(String),
    Revoked,
}

/// Internal record for one submitted step.
struct Slot {
    state: Arc<Mutex<SlotState>>,
    cancel: Option<oneshot::Sender<()>>,
}

/// Queue client that executes commands locally.
pub struct LocalQueueClient {
    next_handle: u64,
    slots: HashMap<Handle, Slot>,
    semaphores: HashMap<QueueName, Arc<Semaphore>>,
    default_workers: usize,
}

impl LocalQueueClient {
    pub fn new(default_workers: usize) -> Self {
        Self {
            next_handle: 0,
            slots: HashMap::new(),
            semaphores: HashMap::new(),
            default_workers,
        }
    }

    /// Build a client with one semaphore per queue the plan references.
    pub fn from_plan(plan: &PlanFile) -> Self {
        let mut client = Self::new(default_workers());
        for queue in plan.referenced_queues() {
            let workers = plan.workers_of(&queue);
            client
                .semaphores
                .insert(queue, Arc::new(Semaphore::new(workers)));
        }
        client
    }

    fn semaphore_for(&mut self, queue: &str) -> Arc<Semaphore> {
        self.semaphores
            .entry(queue.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.default_workers)))
            .clone()
    }
}

/// Wait for a permit, run the process, and record the terminal slot state.
async fn run_slot(
    payload: StepPayload,
    semaphore: Arc<Semaphore>,
    state: Arc<Mutex<SlotState>>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    // A revocation can land while the step is still queued behind the
    // semaphore; it must not start at all in that case.
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                *state.lock().unwrap() = SlotState::Faulted("queue closed".to_string());
                return;
            }
        },
        _ = &mut cancel_rx => {
            debug!(step = %payload.step, "step revoked while queued; never started");
            *state.lock().unwrap() = SlotState::Revoked;
            return;
        }
    };
    let _permit = permit;

    let step = payload.step.clone();
    let outcome = worker::run_step_process(payload, &mut cancel_rx).await;

    let mut guard = state.lock().unwrap();
    *guard = match outcome {
        Ok(ProcessOutcome::Completed(events)) => SlotState::Finished(events),
        Ok(ProcessOutcome::Cancelled) => SlotState::Revoked,
        Err(err) => {
            error!(step = %step, error = %format!("{err:#}"), "step process error");
            SlotState::Faulted(format!("{err:#}"))
        }
    };
}

impl QueueClient for LocalQueueClient {
    fn submit(
        &mut self,
        queue: QueueName,
        payload: StepPayload,
    ) -> Pin<Box<dyn Future<Output = Result<Handle, SubmitError>> + Send + '_>> {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;

        let semaphore = self.semaphore_for(&queue);
        let state = Arc::new(Mutex::new(SlotState::Running));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        debug!(step = %payload.step, queue = %queue, "submitting step to local queue");

        let task_state = Arc::clone(&state);
        tokio::spawn(run_slot(payload, semaphore, task_state, cancel_rx));

        self.slots.insert(
            handle,
            Slot {
                state,
                cancel: Some(cancel_tx),
            },
        );

        Box::pin(async move { Ok(handle) })
    }

    fn poll_ready(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let ready = match self.slots.get(&handle) {
            Some(slot) => !matches!(*slot.state.lock().unwrap(), SlotState::Running),
            // Unknown handles never become ready; the scheduler will only
            // ask about handles it was given.
            None => false,
        };
        Box::pin(async move { ready })
    }

    fn fetch(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + '_>> {
        // A fetched handle is consumed, whatever the outcome; only a
        // not-yet-ready handle stays live.
        let (result, consumed) = match self.slots.get(&handle) {
            None => (Err(FetchError(format!("unknown handle {handle:?}"))), false),
            Some(slot) => {
                let guard = slot.state.lock().unwrap();
                match &*guard {
                    SlotState::Running => (
                        Err(FetchError(format!(
                            "result for handle {handle:?} is not ready"
                        ))),
                        false,
                    ),
                    SlotState::Finished(events) => {
                        (Ok(FetchOutcome::Completed(events.clone())), true)
                    }
                    SlotState::Revoked => (Ok(FetchOutcome::Revoked), true),
                    SlotState::Faulted(message) => (Err(FetchError(message.clone())), true),
                }
            }
        };
        if consumed {
            self.slots.remove(&handle);
        }

        Box::pin(async move { result })
    }

    fn revoke(&mut self, handle: Handle) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        if let Some(slot) = self.slots.get_mut(&handle) {
            if let Some(cancel) = slot.cancel.take() {
                if cancel.send(()).is_err() {
                    debug!(?handle, "step already finished while revoking");
                }
            } else {
                debug!(?handle, "handle already revoked");
            }
        } else {
            debug!(?handle, "revoke for unknown handle; ignoring");
        }
        Box::pin(async move {})
    }
}
