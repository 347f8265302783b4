//! Storage error types.

use arbordb_core::CoreError;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A row or definition was rejected by the catalog.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A row with the same primary key already exists.
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey {
        /// The table.
        table: String,
        /// The rendered key.
        key: String,
    },

    /// An index is not registered with the store.
    #[error("index not found: {0}")]
    UnknownIndex(String),

    /// A seek target does not match the cursor's key order.
    #[error("unsupported seek: {0}")]
    UnsupportedSeek(String),

    /// The operation is not supported.
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
