//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use cyphernova_types::error::{ChatError, ExportError};

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat-session errors.
    Chat(ChatError),
    /// Unknown session id.
    SessionNotFound(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::EmptyInput) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Message must not be empty".to_string(),
            ),
            AppError::Chat(ChatError::Export(ExportError::NothingToExport)) => (
                StatusCode::CONFLICT,
                "NOTHING_TO_EXPORT",
                ExportError::NothingToExport.to_string(),
            ),
            AppError::Chat(e @ ChatError::Template(_)) => {
                (StatusCode::BAD_REQUEST, "TEMPLATE_ERROR", e.to_string())
            }
            AppError::Chat(e @ ChatError::MalformedHistory { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MALFORMED_HISTORY", e.to_string())
            }
            AppError::Chat(e @ ChatError::Upstream(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
            }
            AppError::Chat(e) => (StatusCode::INTERNAL_SERVER_ERROR, "CHAT_ERROR", e.to_string()),
            AppError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("Session '{id}' not found"),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "request failed");
        }
        (status, Json(ApiResponse::failure(code, message))).into_response()
    }
}
