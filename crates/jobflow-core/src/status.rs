use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::StateViolation;

/// Something a caller may attempt on a step or a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Skip,
    Wait,
    Run,
    Rollback,
    Validate,
}

impl Action {
    pub const ALL: [Self; 5] = [
        Self::Skip,
        Self::Wait,
        Self::Run,
        Self::Rollback,
        Self::Validate,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skip => "SKIP",
            Self::Wait => "WAIT",
            Self::Run => "RUN",
            Self::Rollback => "ROLLBACK",
            Self::Validate => "VALIDATE",
        };
        write!(f, "{s}")
    }
}

/// Status of a step or of a whole job.
///
/// Variants are declared in ascending priority. A job reports the
/// highest-priority status among its steps, so a single failing or invalid
/// step dominates any number of healthy ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    Skipped = 0,
    Ready = 1,
    Success = 2,
    SuccessRollback = 3,
    PartialRollback = 4,
    Waiting = 5,
    Running = 6,
    Error = 7,
    Rollback = 8,
    ErrorRollback = 9,
    Invalid = 10,
}

impl Status {
    /// Every status, indexed by priority.
    pub const ALL: [Self; 11] = [
        Self::Skipped,
        Self::Ready,
        Self::Success,
        Self::SuccessRollback,
        Self::PartialRollback,
        Self::Waiting,
        Self::Running,
        Self::Error,
        Self::Rollback,
        Self::ErrorRollback,
        Self::Invalid,
    ];

    /// Aggregation priority; higher wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    /// Actions that may be attempted while in this status.
    #[must_use]
    pub const fn allowed_actions(self) -> &'static [Action] {
        match self {
            Self::Ready => &[Action::Skip, Action::Wait, Action::Run, Action::Validate],
            Self::Success | Self::ErrorRollback => &[
                Action::Skip,
                Action::Wait,
                Action::Rollback,
                Action::Validate,
            ],
            Self::Waiting => &[Action::Run, Action::Rollback],
            Self::Error => &[
                Action::Skip,
                Action::Wait,
                Action::Run,
                Action::Rollback,
                Action::Validate,
            ],
            Self::Invalid => &[Action::Skip, Action::Validate],
            Self::Skipped
            | Self::SuccessRollback
            | Self::PartialRollback
            | Self::Running
            | Self::Rollback => &[],
        }
    }

    #[must_use]
    pub fn is_action_allowed(self, action: Action) -> bool {
        self.allowed_actions().contains(&action)
    }

    /// Gate for every state-changing operation.
    ///
    /// # Errors
    ///
    /// Returns [`StateViolation`] if `action` is not legal in this status.
    pub fn check_action(self, action: Action) -> Result<(), StateViolation> {
        if self.is_action_allowed(action) {
            Ok(())
        } else {
            Err(StateViolation {
                status: self,
                action,
            })
        }
    }

    /// Whether this is a resting status a controller remembers and returns
    /// to after being skipped or kept waiting.
    #[must_use]
    pub const fn is_saved(self) -> bool {
        matches!(
            self,
            Self::Success
                | Self::Error
                | Self::SuccessRollback
                | Self::PartialRollback
                | Self::ErrorRollback
        )
    }

    /// The highest-priority status in `statuses`, or `default` when empty.
    #[must_use]
    pub fn aggregate<I>(statuses: I, default: Self) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        statuses
            .into_iter()
            .max_by_key(|status| status.priority())
            .unwrap_or(default)
    }

    const fn from_priority(priority: u8) -> Self {
        match priority {
            0 => Self::Skipped,
            1 => Self::Ready,
            2 => Self::Success,
            3 => Self::SuccessRollback,
            4 => Self::PartialRollback,
            5 => Self::Waiting,
            6 => Self::Running,
            7 => Self::Error,
            8 => Self::Rollback,
            9 => Self::ErrorRollback,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Skipped => "SKIPPED",
            Self::Ready => "READY",
            Self::Success => "SUCCESS",
            Self::SuccessRollback => "SUCCESS_ROLLBACK",
            Self::PartialRollback => "PARTIAL_ROLLBACK",
            Self::Waiting => "WAITING",
            Self::Running => "RUNNING",
            Self::Error => "ERROR",
            Self::Rollback => "ROLLBACK",
            Self::ErrorRollback => "ERROR_ROLLBACK",
            Self::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}

/// A [`Status`] cell that can be read from any thread.
///
/// Stores use release ordering and loads use acquire ordering, so an
/// observer that sees a status also sees every write made before it.
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    #[must_use]
    pub const fn new(status: Status) -> Self {
        Self(AtomicU8::new(status.priority()))
    }

    #[must_use]
    pub fn load(&self) -> Status {
        Status::from_priority(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, status: Status) {
        self.0.store(status.priority(), Ordering::Release);
    }

    /// Stores `status` and returns the previous value.
    pub fn swap(&self, status: Status) -> Status {
        Status::from_priority(self.0.swap(status.priority(), Ordering::AcqRel))
    }
}

impl Default for AtomicStatus {
    fn default() -> Self {
        Self::new(Status::Ready)
    }
}
