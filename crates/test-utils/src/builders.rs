#![allow(dead_code)]

use std::collections::BTreeMap;
use planloop::config::{PlanFile, QueueSection, RawPlanFile, RunSection, StepConfig};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                run: RunSection::default(),
                queue: BTreeMap::new(),
                step: BTreeMap::new(),
            },
        }
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.plan.step.insert(name.to_string(), step);
        self
    }

    pub fn with_queue(mut self, name: &str, workers: usize) -> Self {
        self.plan
            .queue
            .insert(name.to_string(), QueueSection { workers });
        self
    }

    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.plan.run.tick_ms = tick_ms;
        self
    }

    pub fn with_run_priority(mut self, priority: i64) -> Self {
        self.plan.run.priority = priority;
        self
    }

    pub fn with_default_queue(mut self, queue: &str) -> Self {
        self.plan.run.default_queue = queue.to_string();
        self
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }

    /// Raw, unvalidated form, for validation-failure tests.
    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            step: StepConfig {
                cmd: cmd.to_string(),
                queue: None,
                after: vec![],
                priority: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.step.after.push(dep.to_string());
        self
    }

    pub fn queue(mut self, queue: &str) -> Self {
        self.step.queue = Some(queue.to_string());
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.step.priority = Some(priority);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
