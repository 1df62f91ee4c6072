//! Core error types for studyroom-core.
//!
//! This module defines the error hierarchy using thiserror so that the CLI
//! can report failures from storage, configuration, validation and the tutor
//! client through a single type.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyroom-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Tutor (Gemini API) errors
    #[error("Tutor error: {0}")]
    Tutor(#[from] TutorError),

    /// Every notifier in the dispatch chain failed
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Credential store errors
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Row lookup by id or name found nothing
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Unique constraint on a user-visible name
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: &'static str, key: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Malformed HH:mm clock time
    #[error("Invalid time '{0}': expected HH:mm (24h)")]
    InvalidClockTime(String),

    /// Session end is not after its start
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange { start: String, end: String },

    /// Weekday name could not be parsed
    #[error("Invalid weekday '{0}'")]
    InvalidWeekday(String),

    /// Empty collection
    #[error("Empty collection: {0}")]
    EmptyCollection(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Errors from the Gemini tutor client.
#[derive(Error, Debug)]
pub enum TutorError {
    /// No API key in the environment or the keyring
    #[error("Gemini API key not configured (set GEMINI_API_KEY or run `studyroom auth set-key`)")]
    MissingApiKey,

    /// `tutor.api_base` is not a usable URL
    #[error("Invalid API base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API
    #[error("Gemini API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response had no usable candidate
    #[error("Gemini returned no content{}", .0.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    EmptyResponse(Option<String>),

    /// Audio payload could not be decoded
    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<keyring::Error> for CoreError {
    fn from(err: keyring::Error) -> Self {
        CoreError::Credentials(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
