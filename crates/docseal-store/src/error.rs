//! Error types for the store module.

use docseal_core::TransitionError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A key with the same fingerprint is already registered.
    #[error("duplicate key fingerprint: {0}")]
    DuplicateFingerprint(String),

    /// A document with the same hash is already recorded.
    #[error("duplicate document hash: {0}")]
    DuplicateDocument(String),

    /// Another institution already uses this slug.
    #[error("duplicate institution slug: {0}")]
    DuplicateSlug(String),

    /// Row not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Status change rejected by the transition table.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// JSON column serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
