use std::fmt::Debug;
use std::path::PathBuf;

use jobflow_core::StateViolation;
use thiserror::Error;

/// Error from a step controller or a job.
///
/// Protocol errors are detected before any step body runs. `StepFailed` and
/// `RollbackFailed` carry the step's own error unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JobError<E: Debug> {
    /// The current status forbids the requested action.
    #[error(transparent)]
    StateViolation(#[from] StateViolation),

    /// No step with this name is registered in the job.
    #[error("unknown step '{step}'")]
    UnknownStep {
        /// Name that was looked up.
        step: String,
    },

    /// A step with this name is already registered in the job.
    #[error("step '{step}' is already registered")]
    DuplicateStep {
        /// Name of the step being added.
        step: String,
    },

    /// The step has completed and must be rolled back before it is changed.
    #[error("step '{step}' has completed and is pending rollback")]
    StepInProgress {
        /// Name of the completed step.
        step: String,
    },

    /// The job-wide mutation guard refuses structural changes while
    /// completed steps are pending rollback.
    #[error("cannot change steps: {count} completed step(s) pending rollback")]
    ProgressPending {
        /// Number of steps pending rollback.
        count: usize,
    },

    /// The step's `run` returned an error.
    #[error("step '{step}' failed")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// The error returned by the step.
        #[source]
        source: E,
    },

    /// The step's `rollback` returned an error.
    #[error("rollback of step '{step}' failed")]
    RollbackFailed {
        /// Name of the step whose rollback failed.
        step: String,
        /// The error returned by the step.
        #[source]
        source: E,
    },
}

impl<E: Debug> JobError<E> {
    /// The error raised by a step body, if this is a step-body failure.
    #[must_use]
    pub fn step_error(&self) -> Option<&E> {
        match self {
            Self::StepFailed { source, .. } | Self::RollbackFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Consumes the error, returning the step's own error if there is one.
    #[must_use]
    pub fn into_step_error(self) -> Option<E> {
        match self {
            Self::StepFailed { source, .. } | Self::RollbackFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Name of the step the error concerns, if any.
    #[must_use]
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::UnknownStep { step }
            | Self::DuplicateStep { step }
            | Self::StepInProgress { step }
            | Self::StepFailed { step, .. }
            | Self::RollbackFailed { step, .. } => Some(step),
            Self::StateViolation(_) | Self::ProgressPending { .. } => None,
        }
    }
}

/// Error loading a [`JobConfig`](crate::JobConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read job config '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse job config")]
    Parse(#[source] toml::de::Error),

    #[error("failed to parse job config '{path}'")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
