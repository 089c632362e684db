//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reelforge_core::StageError;
use reelforge_engine::WaitError;
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Submit-time stage rejections (`Wav2LipNotConfigured`,
/// `MissingAudioKey`, ...) are the caller's fault, not the server's.
impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        let payload = err.into_payload();
        ApiError::BadRequest(payload.error)
    }
}

impl From<WaitError> for ApiError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::NotFound => ApiError::NotFound("task not found".to_string()),
            WaitError::Timeout => ApiError::Conflict("wait timed out".to_string()),
            WaitError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}
