use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use jobflow_core::{Action, AtomicStatus, Status};
use tracing::{debug, trace, warn};

use crate::error::JobError;
use crate::step::Step;

/// Receiver of a controller's reports; implemented by a job's shared state.
pub(crate) trait JobLink: Send + Sync {
    fn step_status_changed(&self, step: &'static str, status: Status);

    fn step_completed(&self, step: &'static str);

    fn step_compensated(&self, step: &'static str);
}

/// Stateful wrapper that enforces legal transitions for one step.
///
/// The controller owns the step, its current status, and its saved status:
/// the last resting status (`SUCCESS`, `ERROR`, or one of the rollback
/// outcomes) it returns to after being skipped or kept waiting. Controllers
/// work standalone or linked into a [`Job`](crate::Job).
pub struct StepController<S> {
    step: S,
    name: &'static str,
    status: AtomicStatus,
    saved_status: AtomicStatus,
    parent: RwLock<Option<Weak<dyn JobLink>>>,
}

impl<S> StepController<S>
where
    S: Step,
    S::Error: Debug,
{
    /// Wrap a step, validating it immediately.
    ///
    /// The controller starts `READY` if the step is valid and `INVALID`
    /// otherwise; the step is told its initial status.
    pub fn new(step: S) -> Self {
        let name = step.name();
        let initial = if is_valid(name, &step) {
            Status::Ready
        } else {
            Status::Invalid
        };
        step.on_status(initial);
        Self {
            step,
            name,
            status: AtomicStatus::new(initial),
            saved_status: AtomicStatus::new(Status::Ready),
            parent: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status.load()
    }

    /// The last resting status, or `READY` if there has been none.
    #[must_use]
    pub fn saved_status(&self) -> Status {
        self.saved_status.load()
    }

    #[must_use]
    pub fn step(&self) -> &S {
        &self.step
    }

    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.parent().is_some()
    }

    /// Run the step.
    ///
    /// On success the controller becomes `SUCCESS` and, when linked, joins
    /// its job's progress so a later rollback compensates it.
    ///
    /// # Errors
    ///
    /// Returns `StateViolation` if the current status forbids running, or
    /// `StepFailed` carrying the step's error after moving to `ERROR`.
    pub fn run(&self) -> Result<S::Output, JobError<S::Error>> {
        self.status().check_action(Action::Run)?;
        self.change_status(Status::Running);
        debug!(step = self.name, "running step");
        match self.step.run() {
            Ok(output) => {
                self.change_status(Status::Success);
                if let Some(parent) = self.parent() {
                    parent.step_completed(self.name);
                }
                Ok(output)
            }
            Err(source) => {
                self.change_status(Status::Error);
                warn!(step = self.name, error = ?source, "step failed");
                Err(JobError::StepFailed {
                    step: self.name.to_string(),
                    source,
                })
            }
        }
    }

    /// Compensate the step.
    ///
    /// On success a linked controller leaves its job's progress, whether the
    /// step compensated fully or partially.
    ///
    /// # Errors
    ///
    /// Returns `StateViolation` if the current status forbids rollback, or
    /// `RollbackFailed` carrying the step's error after moving to
    /// `ERROR_ROLLBACK`.
    pub fn rollback(&self) -> Result<(), JobError<S::Error>> {
        self.status().check_action(Action::Rollback)?;
        self.change_status(Status::Rollback);
        debug!(step = self.name, "rolling back step");
        match self.step.rollback() {
            Ok(complete) => {
                if complete {
                    self.change_status(Status::SuccessRollback);
                } else {
                    debug!(step = self.name, "step compensated partially");
                    self.change_status(Status::PartialRollback);
                }
                if let Some(parent) = self.parent() {
                    parent.step_compensated(self.name);
                }
                Ok(())
            }
            Err(source) => {
                self.change_status(Status::ErrorRollback);
                warn!(step = self.name, error = ?source, "step rollback failed");
                Err(JobError::RollbackFailed {
                    step: self.name.to_string(),
                    source,
                })
            }
        }
    }

    /// Re-validate the step, returning to the saved status if it is valid
    /// and moving to `INVALID` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `StateViolation` if the current status forbids validation.
    pub fn validate(&self) -> Result<(), JobError<S::Error>> {
        self.status().check_action(Action::Validate)?;
        self.restore();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StateViolation` if the current status forbids skipping.
    pub fn skip(&self) -> Result<(), JobError<S::Error>> {
        self.status().check_action(Action::Skip)?;
        self.change_status(Status::Skipped);
        Ok(())
    }

    /// Leave `SKIPPED`, re-validating as [`validate`](Self::validate) does.
    /// Does nothing unless the step is skipped.
    pub fn unskip(&self) {
        if self.status() == Status::Skipped {
            self.restore();
        }
    }

    pub(crate) fn waiting(&self) -> Result<(), JobError<S::Error>> {
        self.status().check_action(Action::Wait)?;
        self.change_status(Status::Waiting);
        Ok(())
    }

    pub(crate) fn unwaiting(&self) {
        if self.status() == Status::Waiting {
            self.restore();
        }
    }

    pub(crate) fn link(&self, parent: Weak<dyn JobLink>) {
        let upgraded = parent.upgrade();
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = Some(parent);
        if let Some(parent) = upgraded {
            parent.step_status_changed(self.name, self.status());
        }
    }

    pub(crate) fn unlink(&self) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn parent(&self) -> Option<Arc<dyn JobLink>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn restore(&self) {
        let status = if is_valid(self.name, &self.step) {
            self.saved_status()
        } else {
            Status::Invalid
        };
        self.change_status(status);
    }

    fn change_status(&self, status: Status) {
        let previous = self.status();
        if previous == status {
            return;
        }
        if status.is_saved() {
            self.saved_status.store(status);
        }
        self.status.store(status);
        trace!(step = self.name, from = %previous, to = %status, "step status changed");
        self.step.on_status(status);
        if let Some(parent) = self.parent() {
            parent.step_status_changed(self.name, status);
        }
    }
}

fn is_valid<S: Step>(name: &str, step: &S) -> bool {
    if step.validate() {
        return true;
    }
    warn!(step = name, "step parameters are invalid");
    false
}
