use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. The itinerary page matches on
// these, never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const CONFIRMATION_REQUIRED: &str = "CONFIRMATION_REQUIRED";
    pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";
    pub const UPSTREAM_FORMAT: &str = "UPSTREAM_FORMAT";
    pub const MISSING_KEY: &str = "MISSING_KEY";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type for the itinerary HTTP surface.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an
/// HTTP status code. The JSON response always includes both:
///
/// ```json
/// {"code": "MISSING_KEY", "message": "sales order SO-1 has no detail key"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Sheet, row or block does not exist. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Input data is invalid. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// The operation needs an explicit user confirmation. HTTP 409.
    #[error("{0}")]
    ConfirmationRequired(String),

    /// Upstream request was rejected or answered with a non-2xx status. HTTP 502.
    #[error("{0}")]
    Upstream(String),

    /// Upstream answered with a body that is not JSON or lacks the expected shape. HTTP 502.
    #[error("{0}")]
    UpstreamFormat(String),

    /// The selected sales order has no detail key. HTTP 422.
    #[error("{0}")]
    MissingKey(String),

    /// Unexpected internal error. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::ConfirmationRequired(_) => error_code::CONFIRMATION_REQUIRED,
            ServiceError::Upstream(_) => error_code::UPSTREAM_UNAVAILABLE,
            ServiceError::UpstreamFormat(_) => error_code::UPSTREAM_FORMAT,
            ServiceError::MissingKey(_) => error_code::MISSING_KEY,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::ConfirmationRequired(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::UpstreamFormat(_) => StatusCode::BAD_GATEWAY,
            ServiceError::MissingKey(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
