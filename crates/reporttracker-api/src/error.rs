use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use reporttracker_core::error::WorkflowError;

/// Client-facing error: a status code and a short message. Internals never
/// leak; collaborator/storage failures are logged here and surfaced as a
/// generic server error.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            WorkflowError::Forbidden(message) => Self::new(StatusCode::FORBIDDEN, message),
            WorkflowError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            WorkflowError::Conflict(message) => Self::new(StatusCode::BAD_REQUEST, message),
            WorkflowError::Evidence(err) => {
                tracing::error!("evidence store failed: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
            WorkflowError::Repository(err) => {
                tracing::error!("repository failed: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
