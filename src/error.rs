//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! A failed *live* delivery is never an error: see
//! [`crate::domain::DeliveryOutcome`].

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "recipient not found",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`RelayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category         | HTTP Status                 |
/// |-----------|------------------|-----------------------------|
/// | 1000–1999 | Credentials      | 401 Unauthorized            |
/// | 2000–2999 | Request / Target | 400 / 403 / 404             |
/// | 3000–3999 | Server           | 500 Internal Server Error   |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Credential missing, malformed, expired or badly signed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Credential verified but issued for another purpose (e.g. refresh).
    #[error("invalid token kind: expected access token")]
    InvalidTokenKind,

    /// Verified claims lack a required field.
    #[error("malformed claims: {0}")]
    MalformedClaims(String),

    /// The identity directory could not resolve the recipient.
    #[error("recipient not found")]
    RecipientNotFound,

    /// Sender and recipient are the same user.
    #[error("sender and receiver cannot be the same")]
    InvalidTarget,

    /// Durable-store I/O failure or timeout.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Edit by a non-owner or of an unknown message id.
    #[error("no matching message found or unauthorized")]
    Unauthorized,

    /// Request body or parameters could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Unauthenticated(_) => 1001,
            Self::InvalidTokenKind => 1002,
            Self::MalformedClaims(_) => 1003,
            Self::InvalidRequest(_) => 2000,
            Self::RecipientNotFound => 2001,
            Self::InvalidTarget => 2002,
            Self::Unauthorized => 2003,
            Self::Internal(_) => 3000,
            Self::PersistenceFailed(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) | Self::InvalidTokenKind | Self::MalformedClaims(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::InvalidRequest(_) | Self::InvalidTarget => StatusCode::BAD_REQUEST,
            Self::RecipientNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::PersistenceFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
