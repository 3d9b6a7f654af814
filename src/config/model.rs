// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::QueueName;

/// Top-level plan file as read from TOML, before semantic validation.
///
/// ```toml
/// [run]
/// tick_ms = 1000
/// priority = 0
/// default_queue = "default"
///
/// [queue.io]
/// workers = 2
///
/// [step.extract]
/// cmd = "echo extract"
/// queue = "io"
/// after = ["fetch"]
/// priority = 5
/// ```
///
/// All sections except `[step.<name>]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    /// Run-level settings from `[run]`.
    #[serde(default)]
    pub run: RunSection,

    /// Worker-count overrides per queue from `[queue.<name>]`.
    ///
    /// Queues a step references without a section here are created
    /// implicitly with [`default_workers`] workers.
    #[serde(default)]
    pub queue: BTreeMap<QueueName, QueueSection>,

    /// All steps from `[step.<name>]`, keyed by step name.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Scheduler tick interval in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Run-level priority hint, added to every step's own hint.
    #[serde(default)]
    pub priority: i64,

    /// Queue used by steps that don't name one.
    #[serde(default = "default_queue_name")]
    pub default_queue: QueueName,
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_queue_name() -> QueueName {
    "default".to_string()
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            priority: 0,
            default_queue: default_queue_name(),
        }
    }
}

/// `[queue.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    /// Maximum number of steps this queue executes concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

pub fn default_workers() -> usize {
    4
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// One `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Shell command executed by the worker for this step.
    pub cmd: String,

    /// Target queue; falls back to `[run].default_queue` when omitted.
    #[serde(default)]
    pub queue: Option<QueueName>,

    /// Steps whose output this step consumes.
    #[serde(default)]
    pub after: Vec<String>,

    /// Step-level priority hint; higher numbers dispatch earlier.
    #[serde(default)]
    pub priority: Option<i64>,
}

/// A plan file that has passed semantic validation (`TryFrom<RawPlanFile>`
/// in `config::validate`): at least one step, no unknown or self `after`
/// references, and no dependency cycles.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub run: RunSection,
    pub queue: BTreeMap<QueueName, QueueSection>,
    pub step: BTreeMap<String, StepConfig>,
}

impl PlanFile {
    /// Construct without validating. Only `config::validate` should call this.
    pub(crate) fn new_unchecked(
        run: RunSection,
        queue: BTreeMap<QueueName, QueueSection>,
        step: BTreeMap<String, StepConfig>,
    ) -> Self {
        Self { run, queue, step }
    }

    /// Resolved queue name for a step (its own, or the run default).
    pub fn queue_of(&self, step: &StepConfig) -> QueueName {
        step.queue
            .clone()
            .unwrap_or_else(|| self.run.default_queue.clone())
    }

    /// Worker count for a queue, whether declared or implicit.
    pub fn workers_of(&self, queue: &str) -> usize {
        self.queue
            .get(queue)
            .map(|q| q.workers)
            .unwrap_or_else(default_workers)
    }

    /// Every queue any step resolves to, deduplicated.
    pub fn referenced_queues(&self) -> Vec<QueueName> {
        let mut queues: Vec<QueueName> = self
            .step
            .values()
            .map(|s| self.queue_of(s))
            .collect();
        queues.sort();
        queues.dedup();
        queues
    }
}
