//! Error responses.
//!
//! # Responsibilities
//! - Map upload failures to appropriate HTTP status codes
//! - Render a small JSON error body
//!
//! # Design Decisions
//! - Storage errors are logged with detail but reported as a plain 500

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures of the upload handlers.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name {0:?}")]
    InvalidName(String),

    #[error("file {0:?} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::InvalidName(_) => StatusCode::BAD_REQUEST,
            UploadError::NotFound(_) => StatusCode::NOT_FOUND,
            UploadError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            UploadError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                "storage failure".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
