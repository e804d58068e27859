//! Storage error types.

use thiserror::Error;

/// Errors from the aggregate-state store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The state row changed since it was read; the caller must reload and
    /// redo its merge before saving again.
    #[error("Stale state for {key}: expected version {expected}")]
    StaleState { key: String, expected: i64 },
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
