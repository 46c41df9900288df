use binreplay_core::{BinlogPosition, TableSchema};
use binreplay_state::StateError;
use binreplay_target::TargetError;
use thiserror::Error;

/// Errors raised while replaying events.
///
/// Per-event variants carry the source position of the offending event so a
/// fatal report points at a specific place in the replication log.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("generating sql query at pos {position}: {source}")]
    Generation {
        position: BinlogPosition,
        source: binreplay_core::Error,
    },

    #[error("schema drift on {table} at pos {position}: cached ({cached}), event ({observed})")]
    Drift {
        position: BinlogPosition,
        table: String,
        cached: TableSchema,
        observed: TableSchema,
    },

    #[error("reloading target schema of {table} at pos {position}: {source}")]
    SchemaReload {
        position: BinlogPosition,
        table: String,
        source: TargetError,
    },

    #[error("exec query at pos {first} -> {last} ({bytes} bytes): {source}")]
    Apply {
        first: BinlogPosition,
        last: BinlogPosition,
        bytes: usize,
        source: TargetError,
    },

    #[error("recording checkpoint: {0}")]
    Checkpoint(#[from] StateError),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<WriterError>,
    },

    #[error("queue is closed, {rejected} events were not accepted")]
    QueueClosed { rejected: usize },
}
