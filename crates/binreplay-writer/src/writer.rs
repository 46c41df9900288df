use std::fmt;
use std::sync::Arc;

use binreplay_core::{
    ChangeEvent, Dialect, Marginalia, NoAnnotation, Rewrites, SchemaCache, StatementAnnotator,
};
use binreplay_state::CheckpointSink;
use binreplay_target::TargetDatabase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::apply::BatchApplier;
use crate::batch::fill_batch;
use crate::error::WriterError;
use crate::fatal::ErrorHandler;
use crate::retry::{with_retries, RetryPolicy};
use crate::throttle::Throttler;

/// Component name used in log spans and fatal reports.
pub const COMPONENT: &str = "binlog_writer";

/// What to do when an event's schema differs from the cached one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Raise a drift error.
    #[default]
    Fail,
    /// Accept the event's schema if the target already has the same columns.
    Reload,
}

/// Lifecycle of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Running,
    /// Stop was requested; queued events are still being applied.
    Draining,
    Stopped,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriterState::Running => "running",
            WriterState::Draining => "draining",
            WriterState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum number of events per transaction.
    pub batch_size: usize,
    /// Inbound queue capacity. Defaults to `batch_size`.
    pub queue_capacity: Option<usize>,
    pub retry: RetryPolicy,
    pub drift_policy: DriftPolicy,
    pub dialect: Dialect,
    pub rewrites: Rewrites,
    /// Comment prefixed to every statement, if any.
    pub marginalia: Option<String>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            queue_capacity: None,
            retry: RetryPolicy::default(),
            drift_policy: DriftPolicy::default(),
            dialect: Dialect::default(),
            rewrites: Rewrites::default(),
            marginalia: None,
        }
    }
}

impl WriterConfig {
    fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or(self.batch_size)
            .max(1)
    }
}

/// Consumes change events from its queue and applies them to the target in
/// transactional batches.
pub struct BinlogWriter<T, C, H, R> {
    batch_size: usize,
    retry: RetryPolicy,
    applier: BatchApplier<T, C, R>,
    errors: H,
    queue: mpsc::Receiver<ChangeEvent>,
    stop: watch::Receiver<bool>,
    state: watch::Sender<WriterState>,
}

enum Next {
    Stop,
    Event(Option<ChangeEvent>),
}

impl<T, C, H, R> BinlogWriter<T, C, H, R>
where
    T: TargetDatabase,
    C: CheckpointSink,
    H: ErrorHandler,
    R: Throttler,
{
    pub fn new(
        config: WriterConfig,
        target: T,
        checkpoint: C,
        errors: H,
        throttler: R,
    ) -> (Self, WriterHandle) {
        let (queue_tx, queue_rx) = mpsc::channel(config.effective_queue_capacity());
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(WriterState::Running);
        let (last_processed_tx, last_processed_rx) = watch::channel(None);

        let annotator: Arc<dyn StatementAnnotator> = match config.marginalia {
            Some(ref text) => Arc::new(Marginalia::new(text)),
            None => Arc::new(NoAnnotation),
        };

        let batch_size = config.effective_batch_size();
        let applier = BatchApplier {
            target,
            checkpoint,
            throttler,
            annotator,
            dialect: config.dialect,
            rewrites: config.rewrites,
            drift_policy: config.drift_policy,
            schema_cache: SchemaCache::new(),
            batch: Vec::with_capacity(batch_size),
            last_processed: last_processed_tx,
            applied_events: 0,
            applied_batches: 0,
        };

        let writer = Self {
            batch_size,
            retry: config.retry,
            applier,
            errors,
            queue: queue_rx,
            stop: stop_rx,
            state: state_tx,
        };
        let handle = WriterHandle {
            queue: queue_tx,
            stop: Arc::new(stop_tx),
            state: state_rx,
            last_processed: last_processed_rx,
        };
        (writer, handle)
    }

    /// Replace the statement annotator derived from the config.
    pub fn with_annotator(mut self, annotator: Arc<dyn StatementAnnotator>) -> Self {
        self.applier.annotator = annotator;
        self
    }

    /// Run the consumer loop until the queue is closed and drained, or until
    /// a batch fails after its retry budget is spent.
    ///
    /// A failed batch is reported once to the error handler and returned.
    pub async fn run(self) -> Result<(), WriterError> {
        let span = info_span!("binlog_writer", tag = COMPONENT);
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) -> Result<(), WriterError> {
        info!(
            batch_size = self.batch_size,
            max_attempts = self.retry.max_attempts,
            "Starting binlog writer"
        );

        let mut draining = false;
        loop {
            if !draining && *self.stop.borrow() {
                self.begin_draining();
                draining = true;
            }

            let next = if draining {
                Next::Event(self.queue.recv().await)
            } else {
                tokio::select! {
                    biased;
                    _ = self.stop.changed() => Next::Stop,
                    event = self.queue.recv() => Next::Event(event),
                }
            };

            let first = match next {
                Next::Stop => {
                    // Either stop was requested or every handle is gone.
                    self.begin_draining();
                    draining = true;
                    continue;
                }
                Next::Event(Some(event)) => event,
                Next::Event(None) => break,
            };

            self.applier.batch.push(first);
            if fill_batch(&mut self.queue, &mut self.applier.batch, self.batch_size) {
                debug!("Queue closed by every producer");
            }

            let result = with_retries(
                &self.retry,
                "write events to target",
                &mut self.applier,
                |applier| Box::pin(applier.write_batch()),
            )
            .await;

            if let Err(err) = result {
                return Err(self.fail(err));
            }
            self.applier.batch.clear();
        }

        self.state.send_replace(WriterState::Stopped);
        info!(
            events = self.applier.applied_events,
            batches = self.applier.applied_batches,
            "Binlog writer stopped"
        );
        Ok(())
    }

    fn begin_draining(&mut self) {
        self.queue.close();
        self.state.send_replace(WriterState::Draining);
        info!(queued = self.queue.len(), "Draining binlog writer queue");
    }

    fn fail(&mut self, source: WriterError) -> WriterError {
        let err = WriterError::RetriesExhausted {
            attempts: self.retry.max_attempts.max(1),
            source: Box::new(source),
        };
        self.errors.report_fatal(COMPONENT, &err);

        self.queue.close();
        self.state.send_replace(WriterState::Stopped);
        if !self.queue.is_empty() {
            warn!(
                dropped = self.queue.len(),
                "Discarding queued events after fatal error"
            );
        }
        err
    }
}

/// Producer side of a [`BinlogWriter`].
#[derive(Debug, Clone)]
pub struct WriterHandle {
    queue: mpsc::Sender<ChangeEvent>,
    stop: Arc<watch::Sender<bool>>,
    state: watch::Receiver<WriterState>,
    last_processed: watch::Receiver<Option<DateTime<Utc>>>,
}

impl WriterHandle {
    /// Queue events in order, waiting for capacity as needed.
    ///
    /// Fails with [`WriterError::QueueClosed`] once the writer stopped
    /// accepting events; the error counts the events that were not queued.
    pub async fn buffer_events(&self, events: Vec<ChangeEvent>) -> Result<(), WriterError> {
        let total = events.len();
        for (queued, event) in events.into_iter().enumerate() {
            if self.queue.send(event).await.is_err() {
                let rejected = total - queued;
                warn!(rejected, "Binlog writer queue is closed, rejecting events");
                return Err(WriterError::QueueClosed { rejected });
            }
        }
        Ok(())
    }

    /// Ask the writer to stop accepting events and drain its queue.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            info!("Stop requested for binlog writer");
        }
    }

    pub fn state(&self) -> WriterState {
        *self.state.borrow()
    }

    /// Source commit time of the last applied event.
    pub fn last_processed_event_time(&self) -> Option<DateTime<Utc>> {
        *self.last_processed.borrow()
    }
}
