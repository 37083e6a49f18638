//! Step controllers and job coordination with compensating rollback.
//!
//! A [`Job`] owns an ordered list of [`Step`]s, each wrapped in a
//! [`StepController`] that only lets the step run, roll back, validate, or
//! be skipped when its current [`Status`] allows it. The job reports the
//! worst status among its steps, rolls back completed steps in reverse
//! order, and retries only the steps that have not completed yet.

mod builder;
mod config;
mod controller;
mod erased;
mod error;
mod job;
mod step;

pub use builder::{JobBuilder, StatusListener};
pub use config::{DEFAULT_JOB_NAME, JobConfig, MutationGuard};
pub use controller::StepController;
pub use erased::StepRef;
pub use error::{ConfigError, JobError};
pub use job::Job;
pub use jobflow_core::{Action, Constraints, StateViolation, Status, Validate, Violation};
pub use step::Step;
