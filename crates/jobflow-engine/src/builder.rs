use std::fmt::Debug;
use std::marker::PhantomData;

use jobflow_core::Status;

use crate::config::{JobConfig, MutationGuard};
use crate::job::Job;

/// Callback receiving each distinct job status, on the thread that caused
/// the change.
pub type StatusListener = Box<dyn Fn(Status) + Send + Sync>;

/// Builder for a [`Job`] with a configuration and an optional status
/// listener.
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use jobflow_engine::{Job, MutationGuard, Status};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let job: Job<std::io::Error> = Job::builder()
///     .name("provision")
///     .mutation_guard(MutationGuard::PerStep)
///     .listener(move |status| sink.lock().expect("listener lock").push(status))
///     .build();
///
/// assert_eq!(job.config().name(), "provision");
/// assert_eq!(job.status(), Status::Ready);
/// ```
pub struct JobBuilder<E> {
    config: JobConfig,
    listener: Option<StatusListener>,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> JobBuilder<E>
where
    E: Debug + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: JobConfig::default(),
            listener: None,
            _phantom: PhantomData,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.with_name(name);
        self
    }

    #[must_use]
    pub fn mutation_guard(mut self, mutation_guard: MutationGuard) -> Self {
        self.config = self.config.with_mutation_guard(mutation_guard);
        self
    }

    /// Report every distinct job status to `listener`.
    ///
    /// The listener runs synchronously inside status changes and must not
    /// add, remove, or replace steps of the job it observes.
    #[must_use]
    pub fn listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    #[must_use]
    pub fn build(self) -> Job<E> {
        Job::from_parts(self.config, self.listener)
    }
}

impl<E> Default for JobBuilder<E>
where
    E: Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
