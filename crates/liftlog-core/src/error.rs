//! Error types for Liftlog store operations.
//!
//! This module defines the error hierarchy for the record store and the
//! migration/integrity engine that sits on top of it. Errors are descriptive
//! at this level; presentation layers map them to user-facing messages.

use thiserror::Error;

/// Result type alias for Liftlog operations.
pub type Result<T> = std::result::Result<T, LiftlogError>;

/// Core error type for Liftlog operations.
#[derive(Debug, Error)]
pub enum LiftlogError {
    /// The primary store file does not exist
    #[error("Store file not found")]
    StoreNotFound,

    /// A schema migration step failed; the underlying cause is preserved
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] Box<LiftlogError>),

    /// A record kind could not be enumerated at all
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// The pre-migration backup could not be written
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// A persisted record violates an invariant
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Persisted schema is missing, unknown, or has no upgrade path
    #[error("Schema error: {0}")]
    Schema(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be read, parsed, or written
    #[error("Config error: {0}")]
    Config(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl LiftlogError {
    /// Wrap an error as the cause of a failed migration.
    pub fn migration(err: LiftlogError) -> Self {
        match err {
            already @ LiftlogError::MigrationFailed(_) => already,
            other => LiftlogError::MigrationFailed(Box::new(other)),
        }
    }
}
