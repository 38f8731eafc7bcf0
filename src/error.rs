//! Error types for the rate limit resource adapter.

use thiserror::Error;

use crate::api::ApiError;
use crate::id::IdFormatError;

/// Main error type for adapter operations.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Local, pre-network validation failures
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed composite identifier
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] IdFormatError),

    /// Any remote failure other than a handled not-found
    #[error("Failed to {operation} rate limit {target}: {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: ApiError,
    },

    /// The remote service returned something the adapter cannot work with
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Import of an identifier that does not resolve to a remote rule
    #[error("Import error: {0}")]
    Import(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Wrap a remote failure with the operation and entity it concerns.
    pub fn remote(operation: &'static str, target: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            operation,
            target: target.into(),
            source,
        }
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
