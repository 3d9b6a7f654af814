// src/sched/poller.rs

//! Harvesting of outstanding step results.

use tracing::{debug, warn};

use crate::errors::StepFailure;
use crate::plan::ExecutionPlan;
use crate::remote::{FetchOutcome, QueueClient, StepEvent};
use crate::sched::priority::DispatchKey;
use crate::sched::{ErrorAggregator, LifecycleEvent, OutstandingSet};

/// Poll every outstanding handle once, in priority order, and harvest the
/// ones that are ready.
///
/// Harvesting in priority order lets a high-priority completion unlock its
/// dependents in the plan before lower-priority completions are applied,
/// so the next dispatch pass sees the most urgent newly-ready steps first.
///
/// Steps that are not ready are left outstanding for the next tick. A
/// fetch error is recorded for that step only; the pass always continues
/// with the remaining handles.
pub async fn harvest<C: QueueClient>(
    plan: &mut ExecutionPlan,
    client: &mut C,
    outstanding: &mut OutstandingSet,
    errors: &mut ErrorAggregator,
) -> Vec<LifecycleEvent> {
    // BTreeMap iteration is already (priority, step-id) order.
    let keys: Vec<DispatchKey> = outstanding.keys().cloned().collect();

    let mut events = Vec::new();

    for key in keys {
        let handle = match outstanding.get(&key) {
            Some(entry) => entry.handle,
            None => continue,
        };

        if !client.poll_ready(handle).await {
            continue;
        }

        let entry = match outstanding.remove(&key) {
            Some(entry) => entry,
            None => continue,
        };

        match client.fetch(entry.handle).await {
            Ok(FetchOutcome::Completed(step_events)) => {
                for event in &step_events {
                    plan.apply_event(event);
                    match event {
                        StepEvent::Succeeded { step } => {
                            events.push(LifecycleEvent::StepSucceeded { step: step.clone() });
                        }
                        StepEvent::Failed {
                            step,
                            message,
                            trace,
                        } => {
                            errors.record(
                                step.clone(),
                                StepFailure::with_trace(message.clone(), trace.clone()),
                            );
                            events.push(LifecycleEvent::StepFailed {
                                step: step.clone(),
                                message: message.clone(),
                            });
                        }
                    }
                }
            }
            Ok(FetchOutcome::Revoked) => {
                // Revoked work reports neither success nor failure; the
                // step is simply dropped from further consideration.
                debug!(step = %entry.step, "harvested a revoked step; dropping");
            }
            Err(err) => {
                warn!(
                    step = %entry.step,
                    error = %err,
                    "result fetch failed; recording step failure"
                );
                errors.record(
                    entry.step.clone(),
                    StepFailure::new(format!("result fetch failed: {err}")),
                );
                plan.mark_failed(&entry.step);
                events.push(LifecycleEvent::StepFailed {
                    step: entry.step,
                    message: err.to_string(),
                });
            }
        }
    }

    events
}
