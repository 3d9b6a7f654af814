// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{PlanloopError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::PlanloopError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.run, raw.queue, raw.step))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_steps(plan)?;
    validate_run_section(plan)?;
    validate_step_dependencies(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_steps(plan: &RawPlanFile) -> Result<()> {
    if plan.step.is_empty() {
        return Err(PlanloopError::ConfigError(
            "plan must contain at least one [step.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_run_section(plan: &RawPlanFile) -> Result<()> {
    if plan.run.tick_ms == 0 {
        return Err(PlanloopError::ConfigError(
            "[run].tick_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    for (name, queue) in plan.queue.iter() {
        if queue.workers == 0 {
            return Err(PlanloopError::ConfigError(format!(
                "[queue.{name}].workers must be >= 1 (got 0)"
            )));
        }
    }

    Ok(())
}

fn validate_step_dependencies(plan: &RawPlanFile) -> Result<()> {
    for (name, step) in plan.step.iter() {
        for dep in step.after.iter() {
            if !plan.step.contains_key(dep) {
                return Err(PlanloopError::ConfigError(format!(
                    "step '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(PlanloopError::ConfigError(format!(
                    "step '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Build a petgraph graph from the steps and their dependencies.
    //
    // Edge direction: dep -> step
    // For:
    //   [step.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in plan.step.keys() {
        graph.add_node(name.as_str());
    }

    for (name, step) in plan.step.iter() {
        for dep in step.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(PlanloopError::PlanCycle(format!(
                "cycle detected in step dependencies involving step '{}'",
                node
            )))
        }
    }
}
