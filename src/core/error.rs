//! Error types for admission operations.

use thiserror::Error;

/// Reason given by the scheduling authority when it revokes a schedule entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvalidationError {
    message: String,
}

impl InvalidationError {
    /// Create an invalidation error carrying the authority's message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The authority's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors produced while requesting or releasing download admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The scheduling authority could not be reached.
    #[error("scheduling authority unreachable: {0}")]
    Connection(String),
    /// The authority refused to create a schedule entry.
    #[error("schedule entry rejected: {0}")]
    Scheduling(String),
    /// The authority revoked the entry before permission was granted.
    #[error("schedule entry invalidated: {0}")]
    Invalidated(#[source] InvalidationError),
    /// The caller's cancellation token fired.
    #[error("operation was cancelled")]
    Cancelled,
    /// Removing a schedule entry from the authority failed.
    #[error("failed to remove schedule entry: {0}")]
    Removal(String),
    /// Admission configuration is invalid.
    #[error("invalid admission configuration: {0}")]
    Configuration(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
