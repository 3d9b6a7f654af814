// src/plan/step_info.rs

//! Step metadata and per-run state.

use crate::config::model::StepConfig;
use crate::config::PlanFile;
use crate::types::{QueueName, StepId};

/// State of a step within the single run an [`ExecutionPlan`] represents.
///
/// [`ExecutionPlan`]: crate::plan::ExecutionPlan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Waiting for dependencies; not yet handed to the dispatcher.
    Pending,
    /// Handed to the dispatcher; its handle is (or is about to be)
    /// outstanding.
    Dispatched,
    /// Terminal: the step's events reported success.
    Succeeded,
    /// Terminal: the step failed (reported failure, fetch error, or
    /// submission error).
    Failed,
    /// Terminal: never dispatched because an upstream dependency failed.
    /// This is informational, not an error.
    Unreachable,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Unreachable
        )
    }
}

/// Static step information derived from the plan file, plus run state.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub id: StepId,
    pub cmd: String,
    pub queue: QueueName,
    /// Step-level priority hint from the plan file, if declared.
    pub priority: Option<i64>,
    /// Direct dependencies for this step (names in `after = [...]`).
    pub deps: Vec<StepId>,

    pub state: StepState,
}

impl StepInfo {
    pub fn from_config(id: StepId, cfg: &StepConfig, plan: &PlanFile) -> Self {
        Self {
            id,
            cmd: cfg.cmd.clone(),
            queue: plan.queue_of(cfg),
            priority: cfg.priority,
            deps: cfg.after.clone(),
            state: StepState::Pending,
        }
    }
}

/// Description of a step the plan wants the dispatcher to submit now.
#[derive(Debug, Clone)]
pub struct DispatchableStep {
    pub id: StepId,
    pub cmd: String,
    pub queue: QueueName,
    /// Raw step-level priority hint; the dispatcher combines it with the
    /// run-level hint into a single priority key.
    pub priority: Option<i64>,
}

impl DispatchableStep {
    pub fn from_step_info(info: &StepInfo) -> Self {
        Self {
            id: info.id.clone(),
            cmd: info.cmd.clone(),
            queue: info.queue.clone(),
            priority: info.priority,
        }
    }
}
