use thiserror::Error;

/// Errors from the target database.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("connection closed")]
    Closed,

    #[error("{message} (code: {code})")]
    Database { code: String, message: String },

    #[error("target error: {0}")]
    Other(String),
}

impl From<tokio_postgres::Error> for TargetError {
    fn from(e: tokio_postgres::Error) -> Self {
        // Extract database error details if available
        if let Some(db_err) = e.as_db_error() {
            TargetError::Database {
                code: db_err.code().code().to_string(),
                message: format!("{}: {}", db_err.severity(), db_err.message()),
            }
        } else if e.is_closed() {
            TargetError::Closed
        } else {
            TargetError::Other(e.to_string())
        }
    }
}

pub type TargetResult<T> = Result<T, TargetError>;
