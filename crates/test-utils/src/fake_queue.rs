use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use planloop::remote::{
    FetchError, FetchOutcome, Handle, QueueClient, StepEvent, StepPayload, SubmitError,
};
use planloop::types::{QueueName, StepId};

/// Scripted behaviour for one step in a [`FakeQueueClient`].
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Complete immediately with a `Succeeded` event (the default).
    Succeed,
    /// Complete immediately with a `Failed` event.
    Fail { message: String },
    /// Complete immediately with this exact event list.
    Events(Vec<StepEvent>),
    /// The submit call itself fails.
    RejectSubmit { message: String },
    /// The first `failures` submit calls fail; afterwards the step
    /// succeeds. For exercising dispatcher retry policies.
    FlakySubmit { failures: u32 },
    /// Stay running until [`FakeQueueClient::release`] or a revocation.
    Hold,
    /// Ready immediately, but the fetch call fails.
    FailFetch { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FakeTaskState {
    Running,
    Done,
    Revoked,
}

#[derive(Debug)]
struct FakeTask {
    step: StepId,
    outcome: ScriptedOutcome,
    state: FakeTaskState,
}

#[derive(Debug, Default)]
struct FakeQueueInner {
    scripts: HashMap<StepId, ScriptedOutcome>,
    tasks: HashMap<u64, FakeTask>,
    submitted: Vec<(StepId, QueueName)>,
    revoked: Vec<StepId>,
    next_handle: u64,
}

/// A fake queue client that:
/// - records which steps were submitted (in submission order) and revoked
/// - completes each step according to a per-step script.
///
/// Cloning yields a control handle over the same shared state, so a test
/// can keep scripting/observing while the scheduler owns its clone.
#[derive(Debug, Clone, Default)]
pub struct FakeQueueClient {
    inner: Arc<Mutex<FakeQueueInner>>,
}

impl FakeQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome for a step. Unscripted steps succeed.
    pub fn script(&self, step: &str, outcome: ScriptedOutcome) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .insert(step.to_string(), outcome);
    }

    /// Steps submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<StepId> {
        self.inner
            .lock()
            .unwrap()
            .submitted
            .iter()
            .map(|(step, _)| step.clone())
            .collect()
    }

    /// `(step, queue)` pairs submitted so far, in submission order.
    pub fn submitted_with_queues(&self) -> Vec<(StepId, QueueName)> {
        self.inner.lock().unwrap().submitted.clone()
    }

    /// Steps that have received a revoke call.
    pub fn revoked(&self) -> Vec<StepId> {
        self.inner.lock().unwrap().revoked.clone()
    }

    /// Let a held (`ScriptedOutcome::Hold`) step finish successfully.
    pub fn release(&self, step: &str) {
        let mut inner = self.inner.lock().unwrap();
        for task in inner.tasks.values_mut() {
            if task.step == step && task.state == FakeTaskState::Running {
                task.outcome = ScriptedOutcome::Succeed;
                task.state = FakeTaskState::Done;
            }
        }
    }

    /// Number of handles not yet fetched.
    pub fn live_handles(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }
}

impl QueueClient for FakeQueueClient {
    fn submit(
        &mut self,
        queue: QueueName,
        payload: StepPayload,
    ) -> Pin<Box<dyn Future<Output = Result<Handle, SubmitError>> + Send + '_>> {
        let result = {
            let mut inner = self.inner.lock().unwrap();

            let mut outcome = inner
                .scripts
                .get(&payload.step)
                .cloned()
                .unwrap_or(ScriptedOutcome::Succeed);

            if let ScriptedOutcome::FlakySubmit { failures } = outcome {
                if failures > 0 {
                    inner.scripts.insert(
                        payload.step.clone(),
                        ScriptedOutcome::FlakySubmit {
                            failures: failures - 1,
                        },
                    );
                    return Box::pin(async move {
                        Err(SubmitError {
                            queue,
                            message: "transient submit failure".to_string(),
                        })
                    });
                }
                outcome = ScriptedOutcome::Succeed;
            }

            if let ScriptedOutcome::RejectSubmit { message } = &outcome {
                Err(SubmitError {
                    queue,
                    message: message.clone(),
                })
            } else {
                inner.submitted.push((payload.step.clone(), queue));

                let handle = Handle(inner.next_handle);
                inner.next_handle += 1;

                let state = if matches!(outcome, ScriptedOutcome::Hold) {
                    FakeTaskState::Running
                } else {
                    FakeTaskState::Done
                };

                inner.tasks.insert(
                    handle.0,
                    FakeTask {
                        step: payload.step,
                        outcome,
                        state,
                    },
                );

                Ok(handle)
            }
        };

        Box::pin(async move { result })
    }

    fn poll_ready(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let ready = self
            .inner
            .lock()
            .unwrap()
            .tasks
            .get(&handle.0)
            .map(|task| task.state != FakeTaskState::Running)
            .unwrap_or(false);
        Box::pin(async move { ready })
    }

    fn fetch(
        &mut self,
        handle: Handle,
    ) -> Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + '_>> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            match inner.tasks.remove(&handle.0) {
                None => Err(FetchError(format!("unknown handle {handle:?}"))),
                Some(task) => match (task.state, task.outcome) {
                    (FakeTaskState::Revoked, _) => Ok(FetchOutcome::Revoked),
                    (_, ScriptedOutcome::Succeed) => {
                        Ok(FetchOutcome::Completed(vec![StepEvent::Succeeded {
                            step: task.step,
                        }]))
                    }
                    (_, ScriptedOutcome::Fail { message }) => {
                        Ok(FetchOutcome::Completed(vec![StepEvent::Failed {
                            step: task.step,
                            message,
                            trace: None,
                        }]))
                    }
                    (_, ScriptedOutcome::Events(events)) => {
                        Ok(FetchOutcome::Completed(events))
                    }
                    (_, ScriptedOutcome::FailFetch { message }) => Err(FetchError(message)),
                    (
                        _,
                        ScriptedOutcome::Hold
                        | ScriptedOutcome::RejectSubmit { .. }
                        | ScriptedOutcome::FlakySubmit { .. },
                    ) => Err(FetchError(format!(
                        "fetch called on a step that never completed: {}",
                        task.step
                    ))),
                },
            }
        };

        Box::pin(async move { result })
    }

    fn revoke(&mut self, handle: Handle) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(task) = inner.tasks.get_mut(&handle.0) {
                let step = task.step.clone();
                if task.state == FakeTaskState::Running {
                    task.state = FakeTaskState::Revoked;
                }
                inner.revoked.push(step);
            }
        }
        Box::pin(async move {})
    }
}
