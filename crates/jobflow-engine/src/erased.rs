use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use jobflow_core::Status;

use crate::controller::{JobLink, StepController};
use crate::error::JobError;
use crate::step::Step;

/// Object-safe view of a [`StepController`], erasing the step type and its
/// output so a job can hold heterogeneous steps sharing one error type.
pub(crate) trait ErasedController<E: Debug>: Send + Sync {
    fn name(&self) -> &'static str;

    fn status(&self) -> Status;

    fn saved_status(&self) -> Status;

    fn run(&self) -> Result<(), JobError<E>>;

    fn rollback(&self) -> Result<(), JobError<E>>;

    fn validate(&self) -> Result<(), JobError<E>>;

    fn skip(&self) -> Result<(), JobError<E>>;

    fn unskip(&self);

    fn waiting(&self) -> Result<(), JobError<E>>;

    fn unwaiting(&self);

    fn link(&self, parent: Weak<dyn JobLink>);

    fn unlink(&self);
}

impl<S> ErasedController<S::Error> for StepController<S>
where
    S: Step,
    S::Error: Debug,
{
    fn name(&self) -> &'static str {
        StepController::name(self)
    }

    fn status(&self) -> Status {
        StepController::status(self)
    }

    fn saved_status(&self) -> Status {
        StepController::saved_status(self)
    }

    fn run(&self) -> Result<(), JobError<S::Error>> {
        StepController::run(self).map(drop)
    }

    fn rollback(&self) -> Result<(), JobError<S::Error>> {
        StepController::rollback(self)
    }

    fn validate(&self) -> Result<(), JobError<S::Error>> {
        StepController::validate(self)
    }

    fn skip(&self) -> Result<(), JobError<S::Error>> {
        StepController::skip(self)
    }

    fn unskip(&self) {
        StepController::unskip(self);
    }

    fn waiting(&self) -> Result<(), JobError<S::Error>> {
        StepController::waiting(self)
    }

    fn unwaiting(&self) {
        StepController::unwaiting(self);
    }

    fn link(&self, parent: Weak<dyn JobLink>) {
        StepController::link(self, parent);
    }

    fn unlink(&self) {
        StepController::unlink(self);
    }
}

/// Handle to a controller registered with a [`Job`](crate::Job).
///
/// Operations through a handle act on the controller directly, bypassing the
/// job's structural checks. While the step stays registered its status
/// changes are reported to the job, a successful run adds it to the job's
/// progress, and a successful rollback removes it again. Outputs of
/// [`run`](Self::run) are discarded.
pub struct StepRef<E: Debug> {
    inner: Arc<dyn ErasedController<E>>,
}

impl<E: Debug> StepRef<E> {
    pub(crate) fn new(inner: Arc<dyn ErasedController<E>>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status()
    }

    #[must_use]
    pub fn saved_status(&self) -> Status {
        self.inner.saved_status()
    }

    /// # Errors
    ///
    /// See [`StepController::run`].
    pub fn run(&self) -> Result<(), JobError<E>> {
        self.inner.run()
    }

    /// # Errors
    ///
    /// See [`StepController::rollback`].
    pub fn rollback(&self) -> Result<(), JobError<E>> {
        self.inner.rollback()
    }

    /// # Errors
    ///
    /// See [`StepController::validate`].
    pub fn validate(&self) -> Result<(), JobError<E>> {
        self.inner.validate()
    }

    /// # Errors
    ///
    /// See [`StepController::skip`].
    pub fn skip(&self) -> Result<(), JobError<E>> {
        self.inner.skip()
    }

    pub fn unskip(&self) {
        self.inner.unskip();
    }
}

impl<E: Debug> Clone for StepRef<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Debug> Debug for StepRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRef")
            .field("name", &self.name())
            .field("status", &self.status())
            .finish()
    }
}
