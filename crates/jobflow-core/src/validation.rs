use std::fmt;

use serde::{Deserialize, Serialize};

/// A single constraint a parameter object fails to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    field: String,
    message: String,
}

impl Violation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation capability for step parameters.
///
/// An empty violation list means the parameters are valid.
pub trait Validate {
    fn violations(&self) -> Vec<Violation>;

    fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }
}

impl<T: Validate + ?Sized> Validate for &T {
    fn violations(&self) -> Vec<Violation> {
        (**self).violations()
    }
}

impl<T: Validate> Validate for Option<T> {
    fn violations(&self) -> Vec<Violation> {
        self.as_ref().map_or_else(Vec::new, Validate::violations)
    }
}

/// Collects violations for the common field constraints.
///
/// ```
/// use jobflow_core::{Constraints, Validate, Violation};
///
/// struct Params {
///     name: Option<String>,
///     count: i64,
/// }
///
/// impl Validate for Params {
///     fn violations(&self) -> Vec<Violation> {
///         Constraints::new()
///             .not_empty("name", self.name.as_deref())
///             .positive("count", self.count)
///             .finish()
///     }
/// }
///
/// let params = Params { name: None, count: 0 };
/// assert_eq!(params.violations().len(), 2);
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct Constraints {
    violations: Vec<Violation>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a present, non-empty string.
    pub fn not_empty(mut self, field: &str, value: Option<&str>) -> Self {
        if value.is_none_or(str::is_empty) {
            self.violations
                .push(Violation::new(field, "must not be empty"));
        }
        self
    }

    /// Requires a value strictly greater than zero.
    pub fn positive(mut self, field: &str, value: i64) -> Self {
        if value <= 0 {
            self.violations
                .push(Violation::new(field, "must be greater than 0"));
        }
        self
    }

    /// Records a violation when `condition` does not hold.
    pub fn check(mut self, condition: bool, field: &str, message: &str) -> Self {
        if !condition {
            self.violations.push(Violation::new(field, message));
        }
        self
    }

    /// Merges violations reported by a nested parameter object, prefixing
    /// their fields with `field`.
    pub fn nested(mut self, field: &str, value: &impl Validate) -> Self {
        let prefixed = value
            .violations()
            .into_iter()
            .map(|v| Violation::new(format!("{field}.{}", v.field), v.message));
        self.violations.extend(prefixed);
        self
    }

    #[must_use]
    pub fn finish(self) -> Vec<Violation> {
        self.violations
    }
}
