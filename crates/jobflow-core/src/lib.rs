//! Status lattice and validation contract shared by jobflow jobs and steps.

pub mod error;
pub mod status;
pub mod validation;

pub use error::*;
pub use status::{Action, AtomicStatus, Status};
pub use validation::{Constraints, Validate, Violation};
