mod error;
mod memory;
mod sqlite;

use std::sync::Arc;

use binreplay_core::BinlogPosition;

pub use error::{StateError, StateResult};
pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

/// Durable record of how far a replay stream has been applied.
///
/// Implementations must be idempotent (recording the current position again
/// is a no-op) and monotonic (a position behind the recorded one is rejected).
pub trait CheckpointSink: Send + Sync {
    /// Record that everything up to `position` has been committed to the target.
    fn record_resumable_position(&self, position: &BinlogPosition) -> StateResult<()>;

    /// The last recorded position, if any.
    fn last_resumable_position(&self) -> StateResult<Option<BinlogPosition>>;
}

impl<T: CheckpointSink + ?Sized> CheckpointSink for Arc<T> {
    fn record_resumable_position(&self, position: &BinlogPosition) -> StateResult<()> {
        (**self).record_resumable_position(position)
    }

    fn last_resumable_position(&self) -> StateResult<Option<BinlogPosition>> {
        (**self).last_resumable_position()
    }
}

/// Decide whether `requested` needs to be written on top of `recorded`.
///
/// Returns `Ok(false)` for a repeat of the recorded position and an error if
/// `requested` is behind it.
pub(crate) fn advances(
    stream: &str,
    recorded: Option<&BinlogPosition>,
    requested: &BinlogPosition,
) -> StateResult<bool> {
    match recorded {
        None => Ok(true),
        Some(recorded) if requested > recorded => Ok(true),
        Some(recorded) if requested == recorded => Ok(false),
        Some(recorded) => Err(StateError::Regression {
            stream: stream.to_string(),
            recorded: recorded.clone(),
            requested: requested.clone(),
        }),
    }
}
