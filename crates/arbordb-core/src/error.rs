//! Error types for the core crate.

use thiserror::Error;

/// Maximum length for value display in error messages.
const MAX_VALUE_DISPLAY_LEN: usize = 100;

/// Errors that can occur in the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An argument was rejected at construction time.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A row did not match the shape declared by its row type.
    #[error("data shape mismatch: expected {expected}, got {actual}{}", value.as_ref().map(|v| format!(" (value: {v})")).unwrap_or_default())]
    DataShape {
        /// The expected shape.
        expected: String,
        /// The actual shape.
        actual: String,
        /// The offending value (truncated for display).
        value: Option<String>,
    },

    /// A table name was not found in the group.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A column name was not found in a table.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn {
        /// The table that was searched.
        table: String,
        /// The missing column.
        column: String,
    },
}

impl CoreError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a data shape error without a value.
    #[must_use]
    pub fn data_shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DataShape { expected: expected.into(), actual: actual.into(), value: None }
    }

    /// Creates a data shape error with a value for debugging.
    ///
    /// The value is truncated to 100 characters for display.
    #[must_use]
    pub fn data_shape_with_value(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        let value_str = value.to_string();
        let truncated = if value_str.len() > MAX_VALUE_DISPLAY_LEN {
            let mut end = MAX_VALUE_DISPLAY_LEN;
            while !value_str.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &value_str[..end])
        } else {
            value_str
        };
        Self::DataShape { expected: expected.into(), actual: actual.into(), value: Some(truncated) }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
