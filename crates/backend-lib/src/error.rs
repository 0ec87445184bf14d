// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coderoom_common::ServerEvent;
use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username '{username}' is already taken in room '{room_id}'")]
    UsernameTaken { room_id: String, username: String },

    #[error("Completion backend is not configured")]
    BackendUnavailable,

    #[error("Completion backend error: {0}")]
    Backend(String),

    #[error("Completion backend timed out after {0}s")]
    BackendTimeout(u64),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(Uuid),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UsernameTaken { .. } | AppError::StateConflict(_) => StatusCode::CONFLICT,
            AppError::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::UnknownConnection(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UsernameTaken { .. } => "USERNAME_TAKEN",
            AppError::BackendUnavailable => "BACKEND_UNAVAILABLE",
            AppError::Backend(_) => "BACKEND_ERROR",
            AppError::BackendTimeout(_) => "BACKEND_TIMEOUT",
            AppError::StateConflict(_) => "STATE_CONFLICT",
            AppError::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Internal(_) => "INTERNAL",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "MALFORMED_JSON",
        }
    }

    /// Get a message suitable for sending to the offending client.
    ///
    /// User-recoverable variants keep their detail; internal ones are
    /// sanitized.
    pub fn client_message(&self) -> String {
        match self {
            AppError::UsernameTaken { .. } => "Username already taken in this room".to_string(),
            AppError::BackendUnavailable => {
                "AI assistant is not available. Please check server configuration.".to_string()
            },
            AppError::Backend(_) => "Failed to process AI query".to_string(),
            AppError::BackendTimeout(_) => "AI request timed out".to_string(),
            AppError::StateConflict(msg) => msg.clone(),
            AppError::UnknownConnection(_) => "Connection is not registered".to_string(),
            AppError::Validation(err) => err.to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Internal(_) | AppError::Io(_) => {
                "An internal server error occurred".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
        }
    }

    /// Shape this error as a per-connection `ERROR` wire event.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.error_code().to_string(),
            message: self.client_message(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Detailed messages in development, client-safe in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.client_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::Internal("Failed to send message".to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Backend(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
