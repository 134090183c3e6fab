//! Error types for tracelink-core

use std::time::Duration;

use thiserror::Error;

use crate::types::{AttributionId, FeedbackStatus};

/// Error type for attribution and storage operations
#[derive(Debug, Error)]
pub enum TracelinkError {
    /// A required field is absent or malformed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Attribution does not exist or is not owned by the caller
    #[error("Attribution not found: {0}")]
    NotFound(AttributionId),

    /// A terminal feedback verdict was already recorded
    #[error("Feedback for {id} already recorded as {current}")]
    FeedbackConflict {
        id: AttributionId,
        current: FeedbackStatus,
    },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Store query exceeded its time budget
    #[error("Store query timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TracelinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for tracelink operations
pub type Result<T> = std::result::Result<T, TracelinkError>;
