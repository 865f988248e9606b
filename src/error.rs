//! Error types for the query layer

use thiserror::Error;

/// Main error type for the query layer
#[derive(Error, Debug)]
pub enum Error {
    /// Request planning failed
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Planning failures surfaced to the caller.
///
/// These are the only two user-visible ways a planning call can fail; they
/// map onto HTTP 404 and 413 respectively at the API boundary. Anything else
/// that goes wrong inside the planner is a contract breach and panics with a
/// diagnostic instead of being wrapped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// No retention chain covers the requested window
    #[error("request cannot be satisfied due to lack of available retentions")]
    Unsatisfiable,

    /// The fetch would exceed the hard limit on points per request
    #[error("request exceeds the hard points-per-request limit; reduce the time range or number of targets, or raise the limit")]
    TooManyPoints,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::Unsatisfiable;
        assert!(err.to_string().contains("retentions"));
        let err = PlanError::TooManyPoints;
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_plan_error_wraps_into_crate_error() {
        let err: Error = PlanError::TooManyPoints.into();
        assert!(matches!(err, Error::Plan(PlanError::TooManyPoints)));
    }
}
