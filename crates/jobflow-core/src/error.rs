use thiserror::Error;

use crate::status::{Action, Status};

/// An action was attempted while the current status forbids it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the action {action} is not allowed for status {status}")]
pub struct StateViolation {
    /// Status held when the action was attempted.
    pub status: Status,
    /// The rejected action.
    pub action: Action,
}
