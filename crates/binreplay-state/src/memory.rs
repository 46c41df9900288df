use std::sync::{Arc, Mutex, PoisonError};

use binreplay_core::BinlogPosition;

use crate::error::StateResult;
use crate::{advances, CheckpointSink};

/// In-process checkpoint store, for embedding and tests.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    stream: String,
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    current: Option<BinlogPosition>,
    /// Every position that actually advanced the checkpoint, in order.
    history: Vec<BinlogPosition>,
    /// Number of record calls, including no-op repeats.
    calls: usize,
}

impl MemoryStateStore {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            state: Arc::default(),
        }
    }

    /// Positions that advanced the checkpoint, oldest first.
    pub fn history(&self) -> Vec<BinlogPosition> {
        self.lock().history.clone()
    }

    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckpointSink for MemoryStateStore {
    fn record_resumable_position(&self, position: &BinlogPosition) -> StateResult<()> {
        let mut state = self.lock();
        state.calls += 1;

        if advances(&self.stream, state.current.as_ref(), position)? {
            state.current = Some(position.clone());
            state.history.push(position.clone());
        }
        Ok(())
    }

    fn last_resumable_position(&self) -> StateResult<Option<BinlogPosition>> {
        Ok(self.lock().current.clone())
    }
}
