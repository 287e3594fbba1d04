//! HTTP error type.
//!
//! Handlers return `Result<T, ApiError>`; the error renders as a JSON body
//! `{ "error": message }` with a status code matching the queue error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use queue_core::QueueError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Reading the artifact back failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Identifier or query parameter that cannot name anything.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Queue(e) => match e {
                QueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                QueueError::NotFound(_) => StatusCode::NOT_FOUND,
                QueueError::NotReady { .. } => StatusCode::TOO_EARLY,
                QueueError::Gone(_) => StatusCode::GONE,
                QueueError::ProcessingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                QueueError::AlreadyTerminal { .. } => StatusCode::CONFLICT,
                QueueError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::GONE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Queue(QueueError::ProcessingFailed(m)) => {
                format!("Processing failed: {m}")
            }
            ApiError::Queue(e) => e.to_string(),
            ApiError::Storage(StorageError::NotFound(_)) => "artifact is no longer available".into(),
            // Backend detail (paths, buckets) stays in the log.
            ApiError::Storage(e) => {
                error!(error = %e, "artifact storage error");
                "internal server error".into()
            }
            ApiError::NotFound(m) | ApiError::BadRequest(m) => m.clone(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_core::{JobId, JobState};

    #[test]
    fn queue_errors_map_to_status_codes() {
        let id = JobId::new();
        let cases = [
            (QueueError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (QueueError::NotFound(id), StatusCode::NOT_FOUND),
            (
                QueueError::NotReady {
                    id,
                    state: JobState::Running,
                },
                StatusCode::TOO_EARLY,
            ),
            (QueueError::Gone(id), StatusCode::GONE),
            (
                QueueError::ProcessingFailed("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                QueueError::AlreadyTerminal {
                    id,
                    state: JobState::Completed,
                },
                StatusCode::CONFLICT,
            ),
            (QueueError::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_artifact_is_gone() {
        let err = ApiError::from(StorageError::NotFound("a.wav".into()));
        assert_eq!(err.status(), StatusCode::GONE);
    }
}
