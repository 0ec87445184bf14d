// ============================
// crates/backend-lib/src/validation.rs
// ============================
//! Inbound event validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
const MAX_ROOM_ID_LENGTH: usize = 64;
const MAX_USERNAME_LENGTH: usize = 32;
const MAX_QUERY_LENGTH: usize = 4000;
const MAX_MESSAGE_ID_LENGTH: usize = 64;

// Regex patterns for validation
static ROOM_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<>/\\{}()\[\];]+$").unwrap());
static MESSAGE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid room ID: {0}")]
    InvalidRoomId(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid message ID: {0}")]
    InvalidMessageId(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a room ID
pub fn validate_room_id(room_id: &str) -> ValidationResult<&str> {
    if room_id.is_empty() {
        return Err(ValidationError::InvalidRoomId(
            "Room ID must not be empty".to_string(),
        ));
    }

    if room_id.len() > MAX_ROOM_ID_LENGTH {
        return Err(ValidationError::InvalidRoomId(format!(
            "Room ID cannot exceed {MAX_ROOM_ID_LENGTH} characters"
        )));
    }

    if !ROOM_ID_REGEX.is_match(room_id) {
        return Err(ValidationError::InvalidRoomId(
            "Room ID must contain only alphanumeric characters, hyphens and underscores"
                .to_string(),
        ));
    }

    Ok(room_id)
}

/// Validate a display name
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidUsername(
            "Username must not be empty".to_string(),
        ));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username cannot exceed {MAX_USERNAME_LENGTH} characters"
        )));
    }

    // Check for potentially dangerous characters
    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidUsername(
            "Username contains invalid characters".to_string(),
        ));
    }

    Ok(trimmed)
}

/// Validate an AI query string
pub fn validate_query(query: &str) -> ValidationResult<&str> {
    if query.trim().is_empty() {
        return Err(ValidationError::InvalidQuery(
            "Query must not be empty".to_string(),
        ));
    }

    if query.len() > MAX_QUERY_LENGTH {
        return Err(ValidationError::InvalidQuery(format!(
            "Query cannot exceed {MAX_QUERY_LENGTH} characters"
        )));
    }

    Ok(query)
}

/// Validate a caller-generated correlation ID
pub fn validate_message_id(message_id: &str) -> ValidationResult<&str> {
    if message_id.is_empty() {
        return Err(ValidationError::InvalidMessageId(
            "Message ID must not be empty".to_string(),
        ));
    }

    if message_id.len() > MAX_MESSAGE_ID_LENGTH {
        return Err(ValidationError::InvalidMessageId(format!(
            "Message ID cannot exceed {MAX_MESSAGE_ID_LENGTH} characters"
        )));
    }

    if !MESSAGE_ID_REGEX.is_match(message_id) {
        return Err(ValidationError::InvalidMessageId(
            "Message ID must not contain whitespace".to_string(),
        ));
    }

    Ok(message_id)
}
