//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from the local storage medium and the snapshot store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("storage full: write needs {needed} bytes, quota is {quota} bytes")]
    StorageFull { needed: u64, quota: u64 },

    #[error("corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("section '{0}' collides with a reserved metadata key")]
    ReservedSection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StorageError {
    /// True when the medium rejected a write for lack of space.
    pub fn is_storage_full(&self) -> bool {
        matches!(self, StorageError::StorageFull { .. })
    }
}
