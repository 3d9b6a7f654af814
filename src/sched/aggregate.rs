// src/sched/aggregate.rs

//! Per-step error collection.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{AggregateFailure, StepFailure};
use crate::types::StepId;

/// Accumulates one failure per step without halting other steps.
///
/// The map is purely additive: once a step has a recorded failure it is
/// terminal, and later records for the same step are dropped.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    failures: BTreeMap<StepId, StepFailure>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `step`. The first record wins; returns whether
    /// this call actually inserted.
    pub fn record(&mut self, step: impl Into<StepId>, failure: StepFailure) -> bool {
        let step = step.into();
        if self.failures.contains_key(&step) {
            debug!(step = %step, "step already has a recorded failure; keeping the first");
            return false;
        }
        self.failures.insert(step, failure);
        true
    }

    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Called exactly once at loop exit: the aggregated failure listing
    /// every `(step, error)` pair sorted by step id, or `Ok` if none.
    pub fn into_result(self) -> Result<(), AggregateFailure> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(AggregateFailure::new(self.failures))
        }
    }
}
