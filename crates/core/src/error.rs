//! Error types for schema and type construction.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building types and schema definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid schema definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
    /// Column not found while defining an index or key.
    #[error("column {column} not found in table {table}")]
    ColumnNotFound { table: String, column: String },
    /// Malformed or unsupported type.
    #[error("invalid type: {message}")]
    InvalidType { message: String },
}

impl Error {
    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an invalid type error.
    pub fn invalid_type(message: impl Into<String>) -> Self {
        Error::InvalidType {
            message: message.into(),
        }
    }
}
