/// Canonical step name type used throughout the crate.
pub type StepId = String;

/// Name of a worker queue a step is submitted to.
pub type QueueName = String;
