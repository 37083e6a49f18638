use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use jobflow_core::{Action, AtomicStatus, Status};
use tracing::{debug, trace};

use crate::builder::{JobBuilder, StatusListener};
use crate::config::{JobConfig, MutationGuard};
use crate::controller::{JobLink, StepController};
use crate::erased::{ErasedController, StepRef};
use crate::error::JobError;
use crate::step::Step;

type Controller<E> = Arc<dyn ErasedController<E>>;

/// An ordered set of steps that run as a unit and roll back in reverse.
///
/// The job reports the highest-priority status among its steps (`READY`
/// when it has none). Every step that completes a run joins the job's
/// progress; [`rollback`](Self::rollback) compensates progress from the most
/// recently completed step backwards, and [`run`](Self::run) never re-runs a
/// step that is still in progress, so a run that failed part-way can be
/// retried after fixing the failing step.
///
/// Status reads are lock-free and safe from any thread while another thread
/// drives [`run`](Self::run) or [`rollback`](Self::rollback). Structural
/// changes must not race with either.
///
/// # Example
///
/// ```
/// use jobflow_engine::{Job, Status, Step};
///
/// struct Print(&'static str);
///
/// impl Step for Print {
///     type Output = ();
///     type Error = std::io::Error;
///
///     fn name(&self) -> &'static str {
///         self.0
///     }
///
///     fn run(&self) -> Result<(), Self::Error> {
///         Ok(())
///     }
///
///     fn rollback(&self) -> Result<bool, Self::Error> {
///         Ok(true)
///     }
/// }
///
/// let job = Job::new();
/// job.add_step(Print("fetch"))?;
/// job.add_step(Print("install"))?;
///
/// job.run()?;
/// assert_eq!(job.status(), Status::Success);
///
/// job.rollback()?;
/// assert_eq!(job.status(), Status::SuccessRollback);
/// # Ok::<(), jobflow_engine::JobError<std::io::Error>>(())
/// ```
pub struct Job<E: Debug> {
    shared: Arc<JobShared<E>>,
}

struct JobShared<E: Debug> {
    config: JobConfig,
    listener: Option<StatusListener>,
    status: AtomicStatus,
    steps: Mutex<Vec<Controller<E>>>,
    progress: Mutex<Vec<Controller<E>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Debug + 'static> Job<E> {
    #[must_use]
    pub fn new() -> Self {
        JobBuilder::new().build()
    }

    /// Create a job that reports every distinct status change to `listener`.
    #[must_use]
    pub fn with_listener<F>(listener: F) -> Self
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        JobBuilder::new().listener(listener).build()
    }

    #[must_use]
    pub fn builder() -> JobBuilder<E> {
        JobBuilder::new()
    }

    pub(crate) fn from_parts(config: JobConfig, listener: Option<StatusListener>) -> Self {
        Self {
            shared: Arc::new(JobShared {
                config,
                listener,
                status: AtomicStatus::new(Status::Ready),
                steps: Mutex::new(Vec::new()),
                progress: Mutex::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.shared.status.load()
    }

    #[must_use]
    pub fn config(&self) -> &JobConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.shared.steps).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.shared.steps).is_empty()
    }

    /// Names of the registered steps in execution order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        lock(&self.shared.steps).iter().map(|c| c.name()).collect()
    }

    /// Names of the steps pending rollback, oldest first.
    #[must_use]
    pub fn progress(&self) -> Vec<&'static str> {
        lock(&self.shared.progress)
            .iter()
            .map(|c| c.name())
            .collect()
    }

    #[must_use]
    pub fn step(&self, name: &str) -> Option<StepRef<E>> {
        self.shared.find(name).map(StepRef::new)
    }

    #[must_use]
    pub fn step_status(&self, name: &str) -> Option<Status> {
        self.shared.find(name).map(|c| c.status())
    }

    /// Register a step at the end of the job.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateStep` if a step with the same name is registered,
    /// or `ProgressPending` under the job-wide mutation guard while steps are
    /// pending rollback.
    pub fn add_step<S>(&self, step: S) -> Result<(), JobError<E>>
    where
        S: Step<Error = E> + 'static,
    {
        let name = step.name();
        if self.shared.find(name).is_some() {
            return Err(JobError::DuplicateStep {
                step: name.to_string(),
            });
        }
        self.guard_structure(&[])?;

        let controller: Controller<E> = Arc::new(StepController::new(step));
        lock(&self.shared.steps).push(Arc::clone(&controller));
        controller.link(self.link());
        debug!(job = self.shared.config.name(), step = name, "added step");
        Ok(())
    }

    /// Remove a registered step.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep`, `StepInProgress` if the step is pending
    /// rollback, or `ProgressPending` under the job-wide mutation guard.
    pub fn remove_step(&self, name: &str) -> Result<(), JobError<E>> {
        let controller = self.registered(name)?;
        self.guard_structure(&[name])?;

        lock(&self.shared.steps).retain(|c| c.name() != name);
        controller.unlink();
        debug!(job = self.shared.config.name(), step = name, "removed step");
        self.shared.recalculate();
        Ok(())
    }

    /// Put `to` in the position of the step named `from`.
    ///
    /// If a step named like `to` is already registered elsewhere, its
    /// controller (with its status) moves into `from`'s position and `to`
    /// itself is dropped. Otherwise `to` is wrapped in a fresh controller,
    /// which also covers replacing a step with a new step of the same name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` if `from` is not registered, `StepInProgress` if
    /// either step is pending rollback, or `ProgressPending` under the
    /// job-wide mutation guard.
    pub fn replace_step<S>(&self, from: &str, to: S) -> Result<(), JobError<E>>
    where
        S: Step<Error = E> + 'static,
    {
        let to_name = to.name();
        let previous = self.registered(from)?;
        self.guard_structure(&[from, to_name])?;

        let existing = if to_name == from {
            None
        } else {
            self.shared.find(to_name)
        };
        let reused = existing.is_some();
        let replacement: Controller<E> =
            existing.unwrap_or_else(|| Arc::new(StepController::new(to)));

        {
            let mut steps = lock(&self.shared.steps);
            if reused {
                steps.retain(|c| c.name() != to_name);
            }
            if let Some(slot) = steps.iter_mut().find(|c| c.name() == from) {
                *slot = Arc::clone(&replacement);
            }
        }

        previous.unlink();
        if !reused {
            replacement.link(self.link());
        }
        debug!(
            job = self.shared.config.name(),
            from,
            to = to_name,
            reused,
            "replaced step"
        );
        self.shared.recalculate();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `UnknownStep`, `StepInProgress` if the step is pending
    /// rollback, or `StateViolation` if its status forbids skipping.
    pub fn skip(&self, name: &str) -> Result<(), JobError<E>> {
        let controller = self.registered(name)?;
        self.ensure_not_in_progress(name)?;
        controller.skip()
    }

    /// # Errors
    ///
    /// Returns `UnknownStep` or `StepInProgress` if the step is pending
    /// rollback.
    pub fn unskip(&self, name: &str) -> Result<(), JobError<E>> {
        let controller = self.registered(name)?;
        self.ensure_not_in_progress(name)?;
        controller.unskip();
        Ok(())
    }

    /// Re-validate one step, e.g. after fixing its parameters.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStep` or `StateViolation` if the step's status
    /// forbids validation.
    pub fn validate(&self, name: &str) -> Result<(), JobError<E>> {
        self.registered(name)?.validate()
    }

    /// Run every step that is neither skipped nor pending rollback, in
    /// registration order.
    ///
    /// All of them are validated and marked `WAITING` first; the job as a
    /// whole must allow running. The first failure stops the sequence. Steps
    /// left waiting return to their previous status in every case.
    ///
    /// # Errors
    ///
    /// Returns `StateViolation` before any step runs if a step cannot be
    /// validated or the job's status forbids running, or `StepFailed` with
    /// the first failing step's error.
    pub fn run(&self) -> Result<(), JobError<E>> {
        let pending = self.progress();
        let run_set: Vec<Controller<E>> = self
            .shared
            .snapshot()
            .into_iter()
            .filter(|c| c.status() != Status::Skipped && !pending.contains(&c.name()))
            .collect();
        debug!(
            job = self.shared.config.name(),
            steps = run_set.len(),
            "running job"
        );

        let outcome = self
            .start(Action::Run, &run_set)
            .and_then(|()| run_set.iter().try_for_each(|c| c.run()));
        finish(&run_set);

        if let Err(err) = &outcome {
            debug!(job = self.shared.config.name(), error = %err, "job run stopped");
        }
        outcome
    }

    /// Compensate every step pending rollback, most recently completed
    /// first.
    ///
    /// A step leaves progress only once its rollback returns, so after a
    /// failure the failed step and everything completed before it remain
    /// pending and a later call resumes from there.
    ///
    /// # Errors
    ///
    /// Returns `StateViolation` before any rollback if a pending step cannot
    /// be validated or the job's status forbids rollback, or
    /// `RollbackFailed` with the failing step's error.
    pub fn rollback(&self) -> Result<(), JobError<E>> {
        let pending = lock(&self.shared.progress).clone();
        debug!(
            job = self.shared.config.name(),
            steps = pending.len(),
            "rolling back job"
        );

        let outcome = self
            .start(Action::Rollback, &pending)
            .and_then(|()| self.compensate());
        let remaining = lock(&self.shared.progress).clone();
        finish(&remaining);

        if let Err(err) = &outcome {
            debug!(job = self.shared.config.name(), error = %err, "job rollback stopped");
        }
        outcome
    }

    fn start(&self, action: Action, controllers: &[Controller<E>]) -> Result<(), JobError<E>> {
        for controller in controllers {
            controller.validate()?;
        }
        self.shared.recalculate();
        self.status().check_action(action)?;
        for controller in controllers {
            controller.waiting()?;
        }
        Ok(())
    }

    fn compensate(&self) -> Result<(), JobError<E>> {
        loop {
            let Some(controller) = lock(&self.shared.progress).last().cloned() else {
                return Ok(());
            };
            controller.rollback()?;
        }
    }

    fn registered(&self, name: &str) -> Result<Controller<E>, JobError<E>> {
        self.shared.find(name).ok_or_else(|| JobError::UnknownStep {
            step: name.to_string(),
        })
    }

    fn ensure_not_in_progress(&self, name: &str) -> Result<(), JobError<E>> {
        if self.shared.is_pending(name) {
            return Err(JobError::StepInProgress {
                step: name.to_string(),
            });
        }
        Ok(())
    }

    fn guard_structure(&self, names: &[&str]) -> Result<(), JobError<E>> {
        for name in names {
            self.ensure_not_in_progress(name)?;
        }
        if self.shared.config.mutation_guard() == MutationGuard::JobWide {
            let count = lock(&self.shared.progress).len();
            if count > 0 {
                return Err(JobError::ProgressPending { count });
            }
        }
        Ok(())
    }

    fn link(&self) -> Weak<dyn JobLink> {
        let shared: Arc<dyn JobLink> = self.shared.clone();
        Arc::downgrade(&shared)
    }
}

fn finish<E: Debug>(controllers: &[Controller<E>]) {
    for controller in controllers {
        controller.unwaiting();
    }
}

impl<E: Debug + 'static> Default for Job<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Debug> Debug for Job<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<(&'static str, Status)> = lock(&self.shared.steps)
            .iter()
            .map(|c| (c.name(), c.status()))
            .collect();
        f.debug_struct("Job")
            .field("name", &self.shared.config.name())
            .field("status", &self.shared.status.load())
            .field("steps", &steps)
            .finish_non_exhaustive()
    }
}

impl<E: Debug> JobShared<E> {
    fn find(&self, name: &str) -> Option<Controller<E>> {
        lock(&self.steps).iter().find(|c| c.name() == name).cloned()
    }

    fn snapshot(&self) -> Vec<Controller<E>> {
        lock(&self.steps).clone()
    }

    fn is_pending(&self, name: &str) -> bool {
        lock(&self.progress).iter().any(|c| c.name() == name)
    }

    fn recalculate(&self) {
        let status = {
            let steps = lock(&self.steps);
            Status::aggregate(steps.iter().map(|c| c.status()), Status::Ready)
        };
        self.change_status(status);
    }

    fn change_status(&self, status: Status) {
        let previous = self.status.swap(status);
        if previous == status {
            return;
        }
        debug!(job = self.config.name(), from = %previous, to = %status, "job status changed");
        if let Some(listener) = &self.listener {
            listener(status);
        }
    }
}

impl<E: Debug> JobLink for JobShared<E> {
    fn step_status_changed(&self, step: &'static str, status: Status) {
        trace!(job = self.config.name(), step, %status, "step reported status");
        if status == Status::Invalid {
            self.change_status(Status::Invalid);
        } else {
            self.recalculate();
        }
    }

    fn step_completed(&self, step: &'static str) {
        let Some(controller) = self.find(step) else {
            return;
        };
        let mut progress = lock(&self.progress);
        if !progress.iter().any(|c| c.name() == step) {
            progress.push(controller);
        }
    }

    fn step_compensated(&self, step: &'static str) {
        let mut progress = lock(&self.progress);
        if let Some(index) = progress.iter().rposition(|c| c.name() == step) {
            progress.remove(index);
        }
    }
}
