//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping pipeline errors to appropriate HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use ingres_chat::ChatError;

pub const NO_MESSAGE: &str = "No message provided.";
pub const EXECUTION_FAILED: &str = "Failed to execute database query.";
pub const INTERNAL_ERROR: &str = "An internal error occurred.";
pub const NOT_INITIALIZED: &str = "Backend services are not initialized.";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - missing or invalid input.
    BadRequest(String),
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
    /// 503 Service Unavailable - pipeline not initialized.
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => ApiError::BadRequest(NO_MESSAGE.to_string()),
            ChatError::MessageTooLong(_) => ApiError::BadRequest(err.to_string()),
            ChatError::ExecutionFailed(detail) => {
                error!(error = %detail, "Chat request failed during query execution");
                ApiError::Internal(EXECUTION_FAILED.to_string())
            }
            ChatError::LlmError(detail) | ChatError::Internal(detail) => {
                error!(error = %detail, "Chat request failed unexpectedly");
                ApiError::Internal(INTERNAL_ERROR.to_string())
            }
        }
    }
}
