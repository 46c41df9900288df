use thiserror::Error;

/// Errors that can occur in binreplay-core.
///
/// Every variant other than `InvalidPosition` is a statement generation
/// failure: replaying the same event again reproduces it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("row for {table} has {actual} values but the schema has {expected} columns")]
    RowArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("row image for {table} is empty")]
    EmptyRowImage { table: String },

    #[error("column '{column}' holds a non-finite float")]
    NonFiniteFloat { column: String },

    #[error("column '{column}' cannot be encoded: {reason}")]
    UnsupportedValue { column: String, reason: String },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid binlog position '{0}': expected <file>:<offset>")]
    InvalidPosition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
