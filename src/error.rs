//! Error types for the task graph core

use crate::core::TaskId;
use thiserror::Error;

/// Errors raised by the task graph and its field registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A value is not in the currently available set for the field
    #[error("{field} invariant violation: {value} is not available")]
    InvariantViolation { field: &'static str, value: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
}

impl Error {
    /// Whether this error is a rule violation (as opposed to bad input)
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Error::InvariantViolation { .. })
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvariantViolation {
            field: "status",
            value: "Done".to_string(),
        };
        assert_eq!(err.to_string(), "status invariant violation: Done is not available");
        assert!(err.is_invariant_violation());
        assert_eq!(
            Error::TaskNotFound(TaskId(7)).to_string(),
            "Task not found: #7"
        );
    }
}
