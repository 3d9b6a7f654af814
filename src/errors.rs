// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::types::StepId;

#[derive(Error, Debug)]
pub enum PlanloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Cycle detected in plan: {0}")]
    PlanCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    StepFailures(#[from] AggregateFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PlanloopError>;

/// A single step's recorded failure: a message plus an optional trace
/// captured from the remote worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub message: String,
    pub trace: Option<String>,
}

impl StepFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(message: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            message: message.into(),
            trace,
        }
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(trace) = &self.trace {
            write!(f, "\n{trace}")?;
        }
        Ok(())
    }
}

/// The single error raised at loop exit when one or more steps failed.
///
/// A `BTreeMap` keeps the enumeration sorted by step id, so the rendered
/// message is stable across runs with the same failures.
#[derive(Error, Debug, Clone)]
pub struct AggregateFailure {
    pub failures: BTreeMap<StepId, StepFailure>,
}

impl AggregateFailure {
    pub fn new(failures: BTreeMap<StepId, StepFailure>) -> Self {
        Self { failures }
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.failures.contains_key(step)
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} step(s) failed during plan execution:",
            self.failures.len()
        )?;
        for (step, failure) in self.failures.iter() {
            writeln!(f, "  step '{step}': {}", failure.message)?;
            if let Some(trace) = &failure.trace {
                for line in trace.lines() {
                    writeln!(f, "    {line}")?;
                }
            }
        }
        Ok(())
    }
}
