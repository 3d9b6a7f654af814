// src/plan/mod.rs

//! Execution plan representation and per-run bookkeeping.
//!
//! - [`graph`] holds the directed acyclic graph of steps.
//! - [`execution`] contains [`ExecutionPlan`], the per-run state machine
//!   that decides which steps are ready, applies completion events, and
//!   marks steps unreachable after upstream failures.
//! - [`step_info`] provides step metadata and dispatchable step types.

pub mod execution;
pub mod graph;
pub mod step_info;

pub use execution::ExecutionPlan;
pub use graph::PlanGraph;
pub use step_info::{DispatchableStep, StepInfo, StepState};
