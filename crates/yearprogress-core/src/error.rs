//! Core error types for yearprogress-core.
//!
//! This module defines the error hierarchy using thiserror. The period model
//! and progress engine are pure and only surface validation problems; the
//! event store surfaces `StoreUnavailable`, which callers treat as transient.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core error type for yearprogress-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Recurrence rule cannot be expanded (e.g. an empty weekday set).
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    /// Transient persistence failure. Retry on the next scheduled cycle.
    #[error("Event store unavailable: {0}")]
    StoreUnavailable(#[from] DatabaseError),

    /// Requested event does not exist.
    #[error("Event {0} not found")]
    EventNotFound(i64),

    /// An interval would be empty or inverted.
    #[error("Clock skew: interval end ({end}) is not after start ({start})")]
    ClockSkew {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors. All of them map to [`CoreError::StoreUnavailable`].
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

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A read did not complete within the allowed window
    #[error("Store read timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must not be before start_time ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::StoreUnavailable(err.into())
    }
}

impl CoreError {
    /// Whether the failure is transient and the operation should simply be
    /// retried on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::StoreUnavailable(_))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_become_store_unavailable() {
        let err: CoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn invalid_recurrence_is_not_transient() {
        let err = CoreError::InvalidRecurrence("empty weekday set".into());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Invalid recurrence: empty weekday set");
    }
}
