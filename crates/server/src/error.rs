//! Mapping of engine failures onto HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sparta_engine::EngineError;
use thiserror::Error;
use tracing::error;

/// Error returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Invalid request body: {message}")]
    InvalidBody { message: String },
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidBody { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Engine(engine_error) => match engine_error {
                EngineError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
                EngineError::DuplicateWorkflow { .. } => (StatusCode::CONFLICT, "duplicate_workflow"),
                EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                EngineError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down"),
                EngineError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({"error": code, "message": self.to_string()}))).into_response()
    }
}
