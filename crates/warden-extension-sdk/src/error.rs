//! Capability error types.

use thiserror::Error;

/// Error returned by a native operation handler.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The payload could not be understood
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation ran but could not produce a result
    #[error("Operation failed: {0}")]
    Failed(String),

    /// The handler panicked
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capability result type
pub type CapabilityResult<T> = Result<T, CapabilityError>;
