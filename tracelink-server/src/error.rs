//! Server error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracelink_core::TracelinkError;

/// Errors that can occur while starting or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Request failures as returned to API callers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Required field absent or malformed
    #[error("{0}")]
    Validation(String),

    /// Caller identity missing or not recognised
    #[error("authentication required")]
    Unauthorized,

    /// Record absent or owned by someone else
    #[error("{0}")]
    NotFound(String),

    /// Request conflicts with the record's current state
    #[error("{0}")]
    Conflict(String),

    /// Anything else; the cause is logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<TracelinkError> for ApiError {
    fn from(err: TracelinkError) -> Self {
        match err {
            TracelinkError::Validation(msg) => Self::Validation(msg),
            TracelinkError::NotFound(_) => Self::NotFound("attribution not found".to_string()),
            err @ TracelinkError::FeedbackConflict { .. } => Self::Conflict(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(cause) => {
                tracing::error!(error = %cause, "Request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_core_errors_map_to_statuses() {
        let cases = [
            (
                TracelinkError::Validation("pageUrl is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                TracelinkError::NotFound(Uuid::now_v7()),
                StatusCode::NOT_FOUND,
            ),
            (
                TracelinkError::Database("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_not_found_hides_identifier() {
        let id = Uuid::now_v7();
        let err = ApiError::from(TracelinkError::NotFound(id));
        assert!(!err.to_string().contains(&id.to_string()));
    }

    #[tokio::test]
    async fn test_internal_response_hides_cause() {
        let response = ApiError::Internal("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let raw = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!raw.contains("hunter2"));

        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        assert_eq!(body.error, "internal server error");
        assert_eq!(body.code, "INTERNAL_ERROR");
    }
}
