// src/plan/execution.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::PlanFile;
use crate::plan::graph::PlanGraph;
use crate::plan::step_info::{DispatchableStep, StepInfo, StepState};
use crate::remote::StepEvent;
use crate::types::StepId;

/// ExecutionPlan holds the immutable DAG plus mutable per-run step state
/// for exactly one run (it is built fresh for every run and discarded
/// afterwards).
///
/// It is responsible for:
/// - deciding which steps are ready to dispatch (deps satisfied)
/// - applying completion events harvested from the queue backend
/// - marking steps unreachable when an upstream dependency fails
/// - reporting whole-plan completion
#[derive(Debug)]
pub struct ExecutionPlan {
    graph: PlanGraph,
    steps: HashMap<StepId, StepInfo>,
}

impl ExecutionPlan {
    /// Construct a plan from a validated [`PlanFile`].
    pub fn from_plan_file(plan: &PlanFile) -> Self {
        let graph = PlanGraph::from_plan_file(plan);

        let mut steps = HashMap::new();
        for (name, cfg) in plan.step.iter() {
            let info = StepInfo::from_config(name.clone(), cfg, plan);
            steps.insert(name.clone(), info);
        }

        Self { graph, steps }
    }

    /// Steps whose dependencies are all satisfied and which have not been
    /// dispatched yet. Each returned step is marked `Dispatched`, so a step
    /// is handed out at most once per run.
    pub fn ready_steps(&mut self) -> Vec<DispatchableStep> {
        // Decide first, then mutate to avoid borrowing issues.
        let candidates: Vec<StepId> = self
            .steps
            .values()
            .filter_map(|info| {
                if info.state == StepState::Pending && self.deps_satisfied(info) {
                    Some(info.id.clone())
                } else {
                    None
                }
            })
            .collect();

        let mut ready = Vec::new();
        for id in candidates {
            if let Some(info) = self.steps.get_mut(&id) {
                debug!(step = %info.id, queue = %info.queue, "dependencies satisfied; marking Dispatched");
                info.state = StepState::Dispatched;
                ready.push(DispatchableStep::from_step_info(info));
            }
        }

        ready
    }

    /// Apply one event emitted by a finished step execution.
    pub fn apply_event(&mut self, event: &StepEvent) {
        let id = event.step().to_string();
        let Some(info) = self.steps.get_mut(&id) else {
            warn!(step = %id, "event for unknown step; ignoring");
            return;
        };

        if info.state.is_terminal() {
            warn!(
                step = %id,
                state = ?info.state,
                "event for step already in a terminal state; ignoring"
            );
            return;
        }

        match event {
            StepEvent::Succeeded { .. } => {
                debug!(step = %id, "step completed successfully");
                info.state = StepState::Succeeded;
            }
            StepEvent::Failed { message, .. } => {
                warn!(step = %id, message = %message, "step reported failure");
                info.state = StepState::Failed;
            }
        }
    }

    /// Mark a step failed without a worker event (submission or fetch
    /// errors, where the step never produced a result to decode).
    pub fn mark_failed(&mut self, step: &str) {
        match self.steps.get_mut(step) {
            Some(info) if !info.state.is_terminal() => {
                info.state = StepState::Failed;
            }
            Some(info) => {
                warn!(
                    step = %step,
                    state = ?info.state,
                    "mark_failed on step already in a terminal state; ignoring"
                );
            }
            None => warn!(step = %step, "mark_failed for unknown step; ignoring"),
        }
    }

    /// Pending steps that can never run because some dependency is already
    /// `Failed` or `Unreachable`. Sorted for deterministic reporting.
    pub fn unreachable_candidates(&self) -> Vec<StepId> {
        let mut blocked: Vec<StepId> = self
            .steps
            .values()
            .filter(|info| {
                matches!(info.state, StepState::Failed | StepState::Unreachable)
            })
            .flat_map(|info| self.graph.dependents_of(&info.id).iter())
            .filter(|dependent| {
                self.steps.get(dependent.as_str()).map(|d| d.state) == Some(StepState::Pending)
            })
            .cloned()
            .collect();
        blocked.sort();
        blocked.dedup();
        blocked
    }

    /// Mark a step as skipped due to upstream failure. Only a `Pending`
    /// step can become unreachable.
    pub fn mark_unreachable(&mut self, step: &str) {
        match self.steps.get_mut(step) {
            Some(info) if info.state == StepState::Pending => {
                debug!(step = %step, "marking step unreachable due to upstream failure");
                info.state = StepState::Unreachable;
            }
            Some(info) => {
                warn!(
                    step = %step,
                    state = ?info.state,
                    "mark_unreachable on non-pending step; ignoring"
                );
            }
            None => warn!(step = %step, "mark_unreachable for unknown step; ignoring"),
        }
    }

    /// Whether every step has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.steps.values().all(|info| info.state.is_terminal())
    }

    /// Read-only view of the given step's state (tests and diagnostics).
    pub fn state_of(&self, step: &str) -> Option<StepState> {
        self.steps.get(step).map(|info| info.state)
    }

    /// Whether the dependencies of `info` are all satisfied.
    fn deps_satisfied(&self, info: &StepInfo) -> bool {
        for dep_name in &info.deps {
            let dep = match self.steps.get(dep_name) {
                Some(d) => d,
                None => {
                    warn!(
                        step = %info.id,
                        dep = %dep_name,
                        "dependency missing from step table"
                    );
                    return false;
                }
            };

            if dep.state != StepState::Succeeded {
                return false;
            }
        }

        true
    }
}
