use binreplay_core::ChangeEvent;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Move already-buffered events from `rx` into `batch` without waiting, until
/// `batch` holds `max` events or the queue is momentarily empty.
///
/// Returns `true` if the queue is closed and fully drained.
pub(crate) fn fill_batch(
    rx: &mut mpsc::Receiver<ChangeEvent>,
    batch: &mut Vec<ChangeEvent>,
    max: usize,
) -> bool {
    while batch.len() < max {
        match rx.try_recv() {
            Ok(event) => batch.push(event),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => return true,
        }
    }
    false
}
