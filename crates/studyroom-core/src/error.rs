//! Core error types for studyroom-core.
//!
//! This module defines the error hierarchy using thiserror. Timer-level
//! errors are all recoverable: the engine keeps its last confirmed state and
//! waits for the next tick or snapshot.

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

    /// Session store errors
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Timer engine errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
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

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors raised by a [`crate::store::SessionStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached (network down, backend offline).
    #[error("Session store unavailable: {0}")]
    Unavailable(String),

    /// No document exists under this id.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A document already exists under this id.
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    /// A patch or document could not be encoded.
    #[error("Invalid session document: {0}")]
    InvalidDocument(String),

    #[error("Session store backend error: {0}")]
    Backend(#[from] DatabaseError),
}

/// Errors surfaced by the phase timer engine.
#[derive(Error, Debug)]
pub enum TimerError {
    /// Intent issued by an observer that does not hold the controller role.
    /// No state was changed and nothing was written.
    #[error("Observer '{observer_id}' cannot control this session (controller: {controller_id:?})")]
    PermissionDenied {
        observer_id: String,
        controller_id: Option<String>,
    },

    /// A controller write failed; the last confirmed state is still active.
    #[error("Remote write failed: {0}")]
    RemoteWrite(#[source] StoreError),

    /// A snapshot lacked required fields and was ignored.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The session document does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
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

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidDocument(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_mentions_observer() {
        let err = TimerError::PermissionDenied {
            observer_id: "bob".into(),
            controller_id: Some("alice".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("bob"));
        assert!(msg.contains("alice"));
    }

    #[test]
    fn store_error_wraps_into_core_error() {
        let err: CoreError = StoreError::NotFound("abc".into()).into();
        assert!(matches!(err, CoreError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn locked_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }
}
