use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::encoder::EncodeError;
use crate::models::DraftError;
use crate::studio::StudioError;

pub const NO_IMAGE_MESSAGE: &str = "Please upload at least one product image.";
pub const GENERATION_FAILED_MESSAGE: &str = "We could not generate your posts. Please try again.";

/// Error type for HTTP handlers, rendered as `{"error", "code"}` JSON.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Studio(#[from] StudioError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Studio(StudioError::NoImages) | AppError::Draft(DraftError::NoImages) => {
                (StatusCode::BAD_REQUEST, "NO_IMAGE", NO_IMAGE_MESSAGE.to_string())
            }
            AppError::Studio(StudioError::Generation(detail)) => {
                tracing::error!(error = %detail, "Generation cycle failed");
                (StatusCode::BAD_GATEWAY, "GENERATION_FAILED", GENERATION_FAILED_MESSAGE.to_string())
            }
            AppError::Draft(DraftError::AlreadyGenerating) => {
                (StatusCode::CONFLICT, "GENERATION_IN_PROGRESS", self.to_string())
            }
            AppError::Draft(DraftError::NoSuchImage(_)) | AppError::NotFound => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
            AppError::Encode(e) => (StatusCode::BAD_REQUEST, "INVALID_UPLOAD", e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
