//! Error types for plan construction and execution.

use arbordb_core::CoreError;
use arbordb_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while building or running an operator tree.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Invalid plan construction: a bad range, ordering, or option set.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A lifecycle call made in the wrong state.
    ///
    /// The cursor is left closed.
    #[error("{cursor}: {message}")]
    CursorState {
        /// The operator name.
        cursor: &'static str,
        /// What went wrong.
        message: String,
    },

    /// A row does not have the shape an operator expects.
    #[error("data shape mismatch: {0}")]
    DataShape(String),

    /// A feature the operator does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Execution was cancelled through the context's token.
    #[error("query cancelled")]
    Cancelled,

    /// A blocking operator exceeded the configured row limit.
    #[error("query too large: {actual} rows exceeds the limit of {limit}")]
    QueryTooLarge {
        /// Rows buffered when the limit tripped.
        actual: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A bound expression referenced a position with nothing bound.
    #[error("no value bound at position {0}")]
    UnboundParameter(usize),

    /// An error from the storage layer.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An error from the value or catalog model.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ExecError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a lifecycle error for `cursor`.
    pub fn cursor_state(cursor: &'static str, message: impl Into<String>) -> Self {
        Self::CursorState { cursor, message: message.into() }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
