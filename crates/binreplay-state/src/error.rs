use std::path::PathBuf;

use binreplay_core::BinlogPosition;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("checkpoint for '{stream}' would move backwards from {recorded} to {requested}")]
    Regression {
        stream: String,
        recorded: BinlogPosition,
        requested: BinlogPosition,
    },

    #[error("stored checkpoint is corrupt: {0}")]
    Corrupt(String),

    #[error("state database {} does not exist", .0.display())]
    NotFound(PathBuf),
}

pub type StateResult<T> = Result<T, StateError>;
