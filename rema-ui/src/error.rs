//! Error types for rema-ui
//!
//! Every failure is reported to the browser as `{"error": {"code", "message"}}`
//! and leaves Session State untouched.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Nothing to export yet (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Classification service answered with something unusable (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Classification service unreachable or failing (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<rema_common::Error> for ApiError {
    fn from(err: rema_common::Error) -> Self {
        use rema_common::Error;

        match err {
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::EmptyInput(msg) => ApiError::Conflict(msg),
            Error::MalformedPayload(msg) => ApiError::BadGateway(msg),
            Error::TransportFailure(msg) => ApiError::Unavailable(msg),
            Error::Config(msg) => ApiError::Internal(msg),
            Error::Io(e) => ApiError::Internal(e.to_string()),
            Error::Csv(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "EMPTY_SESSION", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "MALFORMED_PAYLOAD", msg),
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
