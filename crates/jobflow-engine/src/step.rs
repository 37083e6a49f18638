use jobflow_core::{Status, Violation};

/// A unit of work that can be run, compensated, and validated.
///
/// Steps are driven by a [`StepController`](crate::StepController), which
/// decides when each method may be called. All methods take `&self`; steps
/// that keep state between calls use interior mutability.
///
/// # Type Parameters
///
/// - `Output`: Value produced by a successful run
/// - `Error`: The error type for run and rollback failures
pub trait Step: Send + Sync {
    /// Value produced by a successful run.
    type Output;

    /// Error type for run and rollback failures.
    type Error;

    /// Name identifying the step within a job.
    fn name(&self) -> &'static str;

    /// Perform the step's work.
    ///
    /// # Errors
    ///
    /// Returns an error if the work fails. Any side effects already made are
    /// left as they are.
    fn run(&self) -> Result<Self::Output, Self::Error>;

    /// Undo the effects of a previous successful run.
    ///
    /// Returns `true` if the effects were fully compensated. The default
    /// implementation compensates nothing and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    fn rollback(&self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    /// Constraint violations of the step's parameters.
    ///
    /// Steps with parameters usually delegate to their parameters'
    /// [`Validate`](jobflow_core::Validate) implementation.
    fn violations(&self) -> Vec<Violation> {
        Vec::new()
    }

    /// Whether the step may run with its current parameters.
    fn validate(&self) -> bool {
        self.violations().is_empty()
    }

    /// Called with every status the controller moves the step into.
    fn on_status(&self, status: Status) {
        let _ = status;
    }
}
