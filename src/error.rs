use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::chat::ChatError;
use crate::store::StoreError;
use crate::tts::SpeechError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Completion API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Unexpected completion API response: {0}")]
    UpstreamFormat(String),

    #[error("TTS generation failed: {0}")]
    GenerationFailed(String),

    #[error("Story storage failed: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Transport(cause) => AppError::UpstreamUnavailable(cause),
            ChatError::Format(cause) => AppError::UpstreamFormat(cause),
        }
    }
}

impl From<SpeechError> for AppError {
    fn from(err: SpeechError) -> Self {
        AppError::GenerationFailed(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UpstreamUnavailable(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_UNAVAILABLE",
                "Failed to connect to the API.".to_string(),
            ),
            AppError::UpstreamFormat(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UPSTREAM_FORMAT",
                "Unexpected response format.".to_string(),
            ),
            AppError::GenerationFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TTS_ERROR",
                "Failed to generate TTS.".to_string(),
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Failed to access story storage.".to_string(),
            ),
        };

        // Causes stay in the log; the client only sees the generic message.
        if status.is_server_error() {
            tracing::error!("Request failed: {} - {}", code, self);
        } else {
            tracing::warn!("Request rejected: {} - {}", code, message);
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
