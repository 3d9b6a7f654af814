// src/sched/dispatcher.rs

//! Dispatch of ready steps onto the queue backend.

use tracing::{debug, info, warn};

use crate::errors::StepFailure;
use crate::plan::{DispatchableStep, ExecutionPlan};
use crate::remote::{QueueClient, StepPayload};
use crate::sched::priority::{priority_key, DispatchKey};
use crate::sched::{ErrorAggregator, LifecycleEvent, OutstandingSet, OutstandingStep};

/// Retry policy consulted when a submit call fails.
///
/// Retries happen within the submitting tick; a step that exhausts its
/// attempts is failed exactly once and never re-dispatched.
pub trait RetryPolicy: Send + Sync {
    /// Total submit attempts allowed for this step. Values below 1 are
    /// treated as 1.
    fn max_attempts(&self, step: &DispatchableStep) -> u32;
}

/// Default policy: one attempt, no retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn max_attempts(&self, _step: &DispatchableStep) -> u32 {
        1
    }
}

/// Retry every step's submission up to a fixed number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedRetry {
    pub attempts: u32,
}

impl RetryPolicy for FixedRetry {
    fn max_attempts(&self, _step: &DispatchableStep) -> u32 {
        self.attempts.max(1)
    }
}

/// Pulls ready steps from the plan in priority order and submits each to
/// the queue client, recording the returned handles as outstanding.
pub struct Dispatcher {
    retry: Box<dyn RetryPolicy>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            retry: Box::new(NoRetry),
        }
    }

    pub fn with_retry_policy(retry: Box<dyn RetryPolicy>) -> Self {
        Self { retry }
    }

    /// Submit every currently-ready step, most urgent first.
    ///
    /// A single failed submission does not abort the batch: the failure is
    /// recorded for that step only (which also makes its dependents
    /// unreachable) and the remaining ready steps are still submitted.
    pub async fn dispatch_ready<C: QueueClient>(
        &self,
        plan: &mut ExecutionPlan,
        client: &mut C,
        run_priority: i64,
        outstanding: &mut OutstandingSet,
        errors: &mut ErrorAggregator,
    ) -> Vec<LifecycleEvent> {
        let mut ready: Vec<(DispatchKey, DispatchableStep)> = plan
            .ready_steps()
            .into_iter()
            .map(|step| {
                let key = DispatchKey::new(
                    priority_key(step.priority, run_priority),
                    step.id.clone(),
                );
                (key, step)
            })
            .collect();
        ready.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut events = Vec::new();

        for (key, step) in ready {
            match self.submit_step(client, &step).await {
                Ok(handle) => {
                    info!(
                        step = %step.id,
                        queue = %step.queue,
                        priority = key.priority,
                        "step submitted"
                    );
                    outstanding.insert(
                        key,
                        OutstandingStep {
                            step: step.id.clone(),
                            handle,
                        },
                    );
                    events.push(LifecycleEvent::StepSubmitted {
                        step: step.id,
                        queue: step.queue,
                    });
                }
                Err(message) => {
                    warn!(
                        step = %step.id,
                        queue = %step.queue,
                        error = %message,
                        "submission failed; step will not run"
                    );
                    errors.record(step.id.clone(), StepFailure::new(message.clone()));
                    plan.mark_failed(&step.id);
                    events.push(LifecycleEvent::StepFailed {
                        step: step.id,
                        message,
                    });
                }
            }
        }

        events
    }

    /// One step's submit call, driven through the retry policy. Returns the
    /// final error message once attempts are exhausted.
    async fn submit_step<C: QueueClient>(
        &self,
        client: &mut C,
        step: &DispatchableStep,
    ) -> Result<crate::remote::Handle, String> {
        let max_attempts = self.retry.max_attempts(step).max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let payload = StepPayload {
                step: step.id.clone(),
                cmd: step.cmd.clone(),
            };
            match client.submit(step.queue.clone(), payload).await {
                Ok(handle) => return Ok(handle),
                Err(err) => {
                    debug!(
                        step = %step.id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "submit attempt failed"
                    );
                    last_error = err.to_string();
                }
            }
        }

        Err(last_error)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
