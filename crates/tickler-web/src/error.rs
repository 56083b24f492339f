//! Error types for the REST API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use tickler_scheduler::SchedulerError;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum WebError {
    /// The request could not be parsed.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Scheduler error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

impl WebError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Scheduler(SchedulerError::JobNotFound(_)) => StatusCode::NOT_FOUND,
            WebError::Scheduler(SchedulerError::Validation(_))
            | WebError::Scheduler(SchedulerError::InvalidState { .. }) => StatusCode::BAD_REQUEST,
            WebError::Scheduler(SchedulerError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = %status, error = %self, "request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
