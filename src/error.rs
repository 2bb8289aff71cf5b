use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::repository::RepoError;

/// ApiError
///
/// The closed set of failures a request can end with. Every variant maps to one
/// stable status code; the body is always `{"detail": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),
    /// Token absent, malformed or expired, or bad credentials at login (401).
    #[error("{0}")]
    Authentication(&'static str),
    /// Authenticated, but neither the owner nor an admin (403).
    #[error("Insufficient privileges")]
    Authorization,
    /// No record at the requested id (404).
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Uniqueness or referential conflict (409).
    #[error("{0}")]
    Conflict(String),
    /// Anything the caller cannot act on. The cause is logged, never returned (500).
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The single outward face of every token failure.
    pub fn invalid_token() -> Self {
        ApiError::Authentication("Token not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { kind } => ApiError::NotFound(kind),
            err @ RepoError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            // Already logged with its cause at the repository boundary.
            RepoError::Unavailable(_) => ApiError::Internal,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
