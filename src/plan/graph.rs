// src/plan/graph.rs

use std::collections::HashMap;

use crate::config::PlanFile;
use crate::types::StepId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct PlanNode {
    /// Direct dependencies: steps whose outputs this one consumes.
    deps: Vec<StepId>,
    /// Direct dependents: steps that depend on this one.
    dependents: Vec<StepId>,
}

/// Simple in-memory DAG representation keyed by step name.
///
/// This is intentionally lightweight; we already validate acyclicity in
/// `config::validate`, so here we just keep adjacency information for
/// readiness checks and diagnostics.
#[derive(Debug, Clone)]
pub struct PlanGraph {
    nodes: HashMap<StepId, PlanNode>,
}

impl PlanGraph {
    /// Build a DAG from a validated [`PlanFile`].
    ///
    /// Assumes that:
    /// - all `after` references are valid
    /// - there are no cycles
    pub fn from_plan_file(plan: &PlanFile) -> Self {
        let mut nodes: HashMap<StepId, PlanNode> = HashMap::new();

        // First pass: create nodes with their dependency lists.
        for (name, step) in plan.step.iter() {
            nodes.insert(
                name.clone(),
                PlanNode {
                    deps: step.after.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        // Second pass: populate dependents based on deps.
        let step_names: Vec<StepId> = nodes.keys().cloned().collect();
        for step_name in step_names {
            // clone to avoid borrowing issues while mutating
            let deps = nodes
                .get(&step_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(step_name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all step names.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a step (the steps listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[StepId] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a step (steps that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[StepId] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
