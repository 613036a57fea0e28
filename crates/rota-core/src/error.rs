//! Core error types for rota-core.
//!
//! Every fallible operation in the library returns [`CoreError`] (or one of
//! the narrower enums below, which convert into it with `?`).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for rota-core.
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

    /// Notification errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// A referenced engineer or release does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A release with the same name already exists
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// The engineer already holds a role on the release
    #[error("Engineer {engineer_id} is already assigned to release {release}")]
    AlreadyAssigned { engineer_id: String, release: String },

    /// A weight adjustment would drive the ledger below zero
    #[error("Weight of engineer {engineer_id} cannot go below zero (current {weight}, delta {delta})")]
    WeightUnderflow {
        engineer_id: String,
        weight: u32,
        delta: i64,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn engineer_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind: "Engineer",
            id: id.into(),
        }
    }

    pub fn release_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind: "Release",
            id: id.into(),
        }
    }
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors, raised at the boundary before the engine runs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Release name does not follow `YY.M.N`
    #[error("Invalid release name '{0}': must be formatted like 18.9.1")]
    InvalidReleaseName(String),

    /// Date could not be parsed
    #[error("Invalid date '{0}': use the format m/d/yy")]
    InvalidDate(String),

    /// Time of day could not be parsed
    #[error("Invalid time of day '{0}': use the format HH:MM")]
    InvalidTime(String),

    /// Date lies in the past
    #[error("Date {0} is in the past: releases must be scheduled in the future")]
    DateInPast(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Notification side-effect errors. Never fatal to an assignment.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Engineer has no Slack user id on record
    #[error("Engineer {0} has no Slack id")]
    MissingSlackId(String),

    /// No token configured
    #[error("Slack integration is not authenticated")]
    NotAuthenticated,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack answered with `ok: false`
    #[error("Slack {method} failed: {error}")]
    Api { method: String, error: String },

    /// Bookkeeping of sent reminders failed
    #[error("Reminder bookkeeping failed: {0}")]
    Store(String),

    /// Could not start the async runtime used for HTTP calls
    #[error("Runtime error: {0}")]
    Runtime(String),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
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

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_database_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }

    #[test]
    fn not_found_message_names_the_kind() {
        let err = CoreError::engineer_not_found("abc");
        assert_eq!(err.to_string(), "Engineer not found: abc");
    }
}
