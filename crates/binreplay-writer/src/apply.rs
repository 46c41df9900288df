use std::sync::Arc;

use binreplay_core::{
    table_key, ChangeEvent, Dialect, Observation, Rewrites, SchemaCache, StatementAnnotator,
    TransactionBuffer,
};
use binreplay_state::CheckpointSink;
use binreplay_target::TargetDatabase;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::WriterError;
use crate::throttle::Throttler;
use crate::writer::DriftPolicy;

/// Applies the writer's in-flight batch to the target.
///
/// Owns the batch so a retry can regenerate and reapply it from scratch.
pub(crate) struct BatchApplier<T, C, R> {
    pub(crate) target: T,
    pub(crate) checkpoint: C,
    pub(crate) throttler: R,
    pub(crate) annotator: Arc<dyn StatementAnnotator>,
    pub(crate) dialect: Dialect,
    pub(crate) rewrites: Rewrites,
    pub(crate) drift_policy: DriftPolicy,
    pub(crate) schema_cache: SchemaCache,
    pub(crate) batch: Vec<ChangeEvent>,
    pub(crate) last_processed: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) applied_events: u64,
    pub(crate) applied_batches: u64,
}

impl<T, C, R> BatchApplier<T, C, R>
where
    T: TargetDatabase,
    C: CheckpointSink,
    R: Throttler,
{
    /// Write the current batch as one transaction and checkpoint it.
    ///
    /// Schema changes accepted while generating the batch are kept on a copy
    /// of the cache and only take effect once the batch is committed, so a
    /// retry sees the cache exactly as the previous batch left it.
    pub(crate) async fn write_batch(&mut self) -> Result<(), WriterError> {
        let (Some(first), Some(last)) = (self.batch.first(), self.batch.last()) else {
            return Ok(());
        };
        let first_position = first.position.clone();
        let last_position = last.position.clone();

        self.throttler.wait_until_open().await;

        let mut schema_cache = self.schema_cache.clone();
        let mut tx = TransactionBuffer::begin(self.annotator.as_ref());
        for event in &self.batch {
            let (database, table) = self.rewrites.resolve(&event.database, &event.table);

            check_schema(
                &mut schema_cache,
                &self.target,
                self.drift_policy,
                event,
                database,
                table,
            )
            .await?;

            let statement = event.to_sql(self.dialect, database, table).map_err(|source| {
                WriterError::Generation {
                    position: event.position.clone(),
                    source,
                }
            })?;
            tx.push(&statement);
        }

        let statements = self.batch.len();
        let query = tx.commit();
        let bytes = query.len();

        debug!(
            first = %first_position,
            last = %last_position,
            statements,
            bytes,
            "Applying batch"
        );

        self.target
            .execute(query)
            .await
            .map_err(|source| WriterError::Apply {
                first: first_position.clone(),
                last: last_position.clone(),
                bytes,
                source,
            })?;

        // The batch is non-empty, checked above.
        if let Some(last) = self.batch.last() {
            self.checkpoint
                .record_resumable_position(&last.resumable_position)?;
            self.last_processed.send_replace(Some(last.timestamp));
        }

        self.schema_cache = schema_cache;
        self.applied_events += self.batch.len() as u64;
        self.applied_batches += 1;

        debug!(
            first = %first_position,
            last = %last_position,
            batch_size = self.batch.len(),
            "Batch committed"
        );
        Ok(())
    }
}

/// Compare the event's schema with the cached one for its target table.
async fn check_schema<T: TargetDatabase>(
    cache: &mut SchemaCache,
    target: &T,
    policy: DriftPolicy,
    event: &ChangeEvent,
    database: &str,
    table: &str,
) -> Result<(), WriterError> {
    let key = table_key(database, table);
    let cached = match cache.observe(&key, &event.schema) {
        Observation::FirstSeen | Observation::Unchanged => return Ok(()),
        Observation::Drifted { cached } => cached,
    };

    if policy == DriftPolicy::Reload {
        let loaded = target
            .load_table_schema(database.to_string(), table.to_string())
            .await
            .map_err(|source| WriterError::SchemaReload {
                position: event.position.clone(),
                table: key.clone(),
                source,
            })?;

        match loaded {
            Some(current) if current.same_column_names(&event.schema) => {
                info!(
                    table = %key,
                    position = %event.position,
                    "Schema change confirmed by target, updating cache"
                );
                cache.replace(&key, event.schema.clone());
                return Ok(());
            }
            Some(current) => {
                warn!(table = %key, target = %current, "Target schema does not match event");
            }
            None => {
                warn!(table = %key, "Target table not found while reloading schema");
            }
        }
    }

    Err(WriterError::Drift {
        position: event.position.clone(),
        table: key,
        cached,
        observed: event.schema.clone(),
    })
}
