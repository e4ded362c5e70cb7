//! Error types for depcrawl-state

use thiserror::Error;

/// Errors raised while opening or preparing a result store.
///
/// These are startup failures: the crawler cannot run without a sink.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Authentication against the database was rejected
    #[error("Database authentication failed: {0}")]
    Authentication(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Incomplete or malformed store configuration
    #[error("Invalid store configuration: {0}")]
    Config(String),
}

/// Errors returned by [`crate::ResultSink`] and [`crate::ResultStore`] operations.
///
/// A failed `insert` is recoverable: the crawler re-queues the identifier.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record stored for the identifier
    #[error("no record for identifier: {identifier}")]
    NotFound { identifier: String },

    /// The backend rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded
    #[error("record serialization failed: {0}")]
    Serialization(String),

    /// Backend temporarily refused writes
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Connection(err.to_string())
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
