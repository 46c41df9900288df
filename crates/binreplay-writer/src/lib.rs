//! Transactional replay of change events into a target database.
//!
//! A [`BinlogWriter`] owns a bounded queue fed through [`WriterHandle`]s. Its
//! loop drains the queue into batches, applies each batch as a single
//! transaction under a retry budget, and records the batch's resumable
//! position once the transaction has committed.

mod apply;
mod batch;
mod error;
mod fatal;
mod retry;
mod throttle;
mod writer;

pub use error::WriterError;
pub use fatal::{ErrorHandler, FatalSignal, ShutdownOnFatal};
pub use retry::{with_retries, BoxFuture, RetryPolicy};
pub use throttle::{NoThrottle, PauseThrottle, Throttler};
pub use writer::{BinlogWriter, DriftPolicy, WriterConfig, WriterHandle, WriterState, COMPONENT};
