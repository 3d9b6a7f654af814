// src/sched/priority.rs

//! Pure priority scoring for dispatch ordering.

use crate::types::StepId;

/// Combine the step-level and run-level priority hints into a single key.
///
/// Lower key = more urgent, so declared priorities (where higher numbers
/// mean "run me first") are negated. Missing hints count as 0. The function
/// is pure, so dispatch order is reproducible given the same hints.
pub fn priority_key(step_priority: Option<i64>, run_priority: i64) -> i64 {
    -(step_priority.unwrap_or(0) + run_priority)
}

/// Ordering key for dispatch and harvest: priority key first, then step id,
/// so ties between equal-priority steps break lexicographically and the
/// whole order is deterministic.
///
/// The derived `Ord` relies on field order: `priority` before `step`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DispatchKey {
    pub priority: i64,
    pub step: StepId,
}

impl DispatchKey {
    pub fn new(priority: i64, step: impl Into<StepId>) -> Self {
        Self {
            priority,
            step: step.into(),
        }
    }
}
