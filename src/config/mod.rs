// src/config/mod.rs

//! Plan file loading and validation.
//!
//! - [`model`] maps the TOML plan file onto typed sections.
//! - [`loader`] reads and parses a plan from disk.
//! - [`validate`] turns a [`model::RawPlanFile`] into a validated
//!   [`model::PlanFile`] (reference checks + cycle detection).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{PlanFile, QueueSection, RawPlanFile, RunSection, StepConfig};
