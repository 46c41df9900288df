//! End-to-end replay scenarios against the mock target.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use binreplay_core::{
    BinlogPosition, ChangeEvent, Column, Dialect, RowChange, TableSchema, Value,
};
use binreplay_state::{CheckpointSink, MemoryStateStore, SqliteStateStore, StateError};
use binreplay_target::MockTarget;
use binreplay_writer::{
    BinlogWriter, DriftPolicy, NoThrottle, PauseThrottle, RetryPolicy, ShutdownOnFatal,
    WriterConfig, WriterError, WriterState,
};

fn pos(offset: u64) -> BinlogPosition {
    BinlogPosition::new("mysql-bin.000003", offset)
}

fn schema(columns: &[&str]) -> TableSchema {
    TableSchema::new(
        columns
            .iter()
            .map(|name| Column::new(*name, "bigint"))
            .collect(),
    )
}

fn insert(table: &str, id: i64, offset: u64) -> ChangeEvent {
    ChangeEvent::new(
        "app",
        table,
        schema(&["id", "n"]),
        RowChange::Insert {
            new: vec![Value::Int(id), Value::Int(0)],
        },
        pos(offset),
    )
}

fn update(table: &str, id: i64, offset: u64) -> ChangeEvent {
    ChangeEvent::new(
        "app",
        table,
        schema(&["id", "n"]),
        RowChange::Update {
            old: vec![Value::Int(id), Value::Int(0)],
            new: vec![Value::Int(id), Value::Int(1)],
        },
        pos(offset),
    )
}

/// Insert written after a column was added to the table.
fn altered(table: &str, id: i64, offset: u64) -> ChangeEvent {
    let mut event = insert(table, id, offset);
    event.schema = schema(&["id", "n", "email"]);
    event.change = RowChange::Insert {
        new: vec![Value::Int(id), Value::Int(0), Value::Null],
    };
    event
}

fn config(batch_size: usize) -> WriterConfig {
    WriterConfig {
        batch_size,
        queue_capacity: Some(64),
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}

fn expected_statements(events: &[ChangeEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.to_sql(Dialect::Postgres, &e.database, &e.table).unwrap())
        .collect()
}

/// Number of statements inside each committed transaction.
fn batch_sizes(target: &MockTarget) -> Vec<usize> {
    target
        .committed()
        .iter()
        .map(|request| request.split(";\n").count() - 2)
        .collect()
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_two_batches_checkpoint_in_order() {
    let target = MockTarget::new();
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let (writer, handle) = BinlogWriter::new(
        config(2),
        target.clone(),
        store.clone(),
        fatal.clone(),
        NoThrottle,
    );

    let events = vec![insert("t1", 1, 100), update("t1", 1, 200), insert("t2", 3, 300)];
    handle.buffer_events(events.clone()).await.unwrap();
    handle.stop();
    writer.run().await.unwrap();

    assert_eq!(target.attempts(), 2);
    assert_eq!(batch_sizes(&target), vec![2, 1]);
    assert_eq!(store.history(), vec![pos(200), pos(300)]);
    assert_eq!(target.committed_statements(), expected_statements(&events));
    assert_eq!(fatal.report_count(), 0);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer({
            let capture = capture.clone();
            move || capture.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let target = MockTarget::new();
    target.fail_next(2, "connection reset by peer");
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let (writer, handle) = BinlogWriter::new(
        config(10),
        target.clone(),
        store.clone(),
        fatal.clone(),
        NoThrottle,
    );

    handle
        .buffer_events(vec![insert("t1", 1, 100), insert("t1", 2, 200)])
        .await
        .unwrap();
    handle.stop();
    writer.run().await.unwrap();

    assert_eq!(target.attempts(), 3);
    assert_eq!(target.committed().len(), 1);
    assert_eq!(store.history(), vec![pos(200)]);
    assert_eq!(fatal.report_count(), 0);

    let logs = capture.contents();
    assert_eq!(
        logs.matches("failed to write events to target, retrying")
            .count(),
        2
    );
    assert!(!logs.contains("retry limit exceeded"));
}

#[tokio::test]
async fn test_exhausted_retries_are_fatal() {
    let target = MockTarget::failing("connection refused");
    let store = MemoryStateStore::new("main");
    let (fatal, mut signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        batch_size: 1,
        queue_capacity: Some(8),
        retry: RetryPolicy::immediate(2),
        ..Default::default()
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    handle
        .buffer_events(vec![insert("t1", 1, 100), insert("t1", 2, 200), insert("t1", 3, 300)])
        .await
        .unwrap();

    let err = writer.run().await.unwrap_err();
    match err {
        WriterError::RetriesExhausted { attempts, ref source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(**source, WriterError::Apply { .. }));
        }
        ref other => panic!("unexpected error: {other}"),
    }

    // Only the first batch was attempted.
    assert_eq!(target.attempts(), 2);
    assert_eq!(fatal.report_count(), 1);
    assert!(store.history().is_empty());
    assert_eq!(handle.state(), WriterState::Stopped);

    let message = signal.wait().await.unwrap();
    assert!(message.starts_with("binlog_writer: "));

    let rejected = handle.buffer_events(vec![insert("t1", 4, 400)]).await;
    assert!(matches!(rejected, Err(WriterError::QueueClosed { rejected: 1 })));
}

#[tokio::test]
async fn test_order_preserved_with_concurrent_producer() {
    let target = MockTarget::new();
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        batch_size: 3,
        queue_capacity: Some(4),
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal, NoThrottle);

    let events: Vec<ChangeEvent> = (1..=50).map(|i| insert("t1", i, i as u64 * 10)).collect();
    let producer = {
        let handle = handle.clone();
        let events = events.clone();
        tokio::spawn(async move {
            for chunk in events.chunks(7) {
                handle.buffer_events(chunk.to_vec()).await.unwrap();
                tokio::task::yield_now().await;
            }
            handle.stop();
        })
    };

    writer.run().await.unwrap();
    producer.await.unwrap();

    // Every accepted event was applied before the loop ended, in order.
    assert_eq!(target.committed_statements(), expected_statements(&events));
    assert!(batch_sizes(&target).iter().all(|size| (1..=3).contains(size)));
    assert_eq!(store.last_resumable_position().unwrap(), Some(pos(500)));

    let history = store.history();
    assert!(history.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_checkpoint_uses_resumable_position() {
    let target = MockTarget::new();
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let (writer, handle) =
        BinlogWriter::new(config(10), target, store.clone(), fatal, NoThrottle);

    // Mid-transaction events can only resume from the transaction start.
    let events = vec![
        insert("t1", 1, 100).with_resumable_position(pos(50)),
        insert("t1", 2, 200).with_resumable_position(pos(50)),
    ];
    handle.buffer_events(events).await.unwrap();
    handle.stop();
    writer.run().await.unwrap();

    assert_eq!(store.history(), vec![pos(50)]);
}

#[tokio::test]
async fn test_drift_fails_without_reload() {
    let target = MockTarget::new();
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        batch_size: 1,
        queue_capacity: Some(8),
        retry: RetryPolicy::immediate(1),
        ..Default::default()
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    let mut altered = insert("t1", 2, 200);
    altered.schema = schema(&["id", "n", "email"]);
    altered.change = RowChange::Insert {
        new: vec![Value::Int(2), Value::Int(0), Value::from("a@example.com")],
    };

    handle
        .buffer_events(vec![insert("t1", 1, 100), altered])
        .await
        .unwrap();
    handle.stop();

    let err = writer.run().await.unwrap_err();
    let WriterError::RetriesExhausted { source, .. } = err else {
        panic!("expected retries exhausted");
    };
    match *source {
        WriterError::Drift {
            position,
            table,
            cached,
            observed,
        } => {
            assert_eq!(position, pos(200));
            assert_eq!(table, "app.t1");
            assert_eq!(cached.len(), 2);
            assert_eq!(observed.len(), 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(target.committed().len(), 1);
    assert_eq!(store.history(), vec![pos(100)]);
    assert_eq!(fatal.report_count(), 1);
}

#[tokio::test]
async fn test_drift_reconciled_by_reload() {
    let target = MockTarget::new();
    target.set_table_schema("app", "t1", schema(&["id", "n", "email"]));
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        drift_policy: DriftPolicy::Reload,
        ..config(1)
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    handle
        .buffer_events(vec![insert("t1", 1, 100), altered("t1", 2, 200)])
        .await
        .unwrap();
    handle.stop();
    writer.run().await.unwrap();

    assert_eq!(target.committed().len(), 2);
    assert_eq!(target.schema_loads(), 1);
    assert_eq!(store.history(), vec![pos(100), pos(200)]);
    assert_eq!(fatal.report_count(), 0);
}

#[tokio::test]
async fn test_retry_after_reload_revalidates_whole_batch() {
    let target = MockTarget::new();
    target.set_table_schema("app", "t1", schema(&["id", "n", "email"]));
    target.fail_next(1, "connection reset by peer");
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        drift_policy: DriftPolicy::Reload,
        ..config(10)
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    // One batch: old-schema rows, then the first row after an ALTER TABLE.
    // The first attempt accepts the new schema and then fails to execute.
    let events = vec![insert("t1", 1, 100), insert("t1", 2, 200), altered("t1", 3, 300)];
    handle.buffer_events(events.clone()).await.unwrap();
    handle.stop();
    writer.run().await.unwrap();

    assert_eq!(target.attempts(), 2);
    assert_eq!(target.schema_loads(), 2);
    assert_eq!(target.committed_statements(), expected_statements(&events));
    assert_eq!(store.history(), vec![pos(300)]);
    assert_eq!(fatal.report_count(), 0);
}

#[tokio::test]
async fn test_schema_reload_failure_is_fatal() {
    let target = MockTarget::new();
    target.fail_schema_loads(5, "statement timeout");
    let store = MemoryStateStore::new("main");
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        drift_policy: DriftPolicy::Reload,
        retry: RetryPolicy::immediate(2),
        ..config(1)
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    handle
        .buffer_events(vec![insert("t1", 1, 100), altered("t1", 2, 200)])
        .await
        .unwrap();
    handle.stop();

    let err = writer.run().await.unwrap_err();
    match err {
        WriterError::RetriesExhausted { attempts, ref source } => {
            assert_eq!(attempts, 2);
            match **source {
                WriterError::SchemaReload {
                    ref position,
                    ref table,
                    ..
                } => {
                    assert_eq!(*position, pos(200));
                    assert_eq!(table, "app.t1");
                }
                ref other => panic!("unexpected source: {other}"),
            }
        }
        ref other => panic!("unexpected error: {other}"),
    }

    assert_eq!(target.committed().len(), 1);
    assert_eq!(target.schema_loads(), 2);
    assert_eq!(store.history(), vec![pos(100)]);
    assert_eq!(fatal.report_count(), 1);
}

#[tokio::test]
async fn test_checkpoint_failure_after_commit_is_fatal() {
    let target = MockTarget::new();
    let store = MemoryStateStore::new("main");
    store.record_resumable_position(&pos(900)).unwrap();
    let (fatal, _signal) = ShutdownOnFatal::new();
    let config = WriterConfig {
        retry: RetryPolicy::immediate(2),
        ..config(10)
    };
    let (writer, handle) =
        BinlogWriter::new(config, target.clone(), store.clone(), fatal.clone(), NoThrottle);

    handle.buffer_events(vec![insert("t1", 1, 100)]).await.unwrap();
    handle.stop();

    let err = writer.run().await.unwrap_err();
    match err {
        WriterError::RetriesExhausted { attempts, ref source } => {
            assert_eq!(attempts, 2);
            assert!(matches!(
                **source,
                WriterError::Checkpoint(StateError::Regression { .. })
            ));
        }
        ref other => panic!("unexpected error: {other}"),
    }

    // Each attempt re-applied the batch before the checkpoint was refused.
    assert_eq!(target.committed().len(), 2);
    assert_eq!(store.history(), vec![pos(900)]);
    assert_eq!(store.calls(), 3);
    assert_eq!(fatal.report_count(), 1);
    assert!(handle.last_processed_event_time().is_none());
}

#[tokio::test]
async fn test_rewrites_apply_to_target_names() {
    let target = MockTarget::new();
    let (fatal, _signal) = ShutdownOnFatal::new();
    let mut config = config(10);
    config
        .rewrites
        .databases
        .insert("app".to_string(), "app_v2".to_string());
    config
        .rewrites
        .tables
        .insert("t1".to_string(), "accounts".to_string());

    let (writer, handle) = BinlogWriter::new(
        config,
        target.clone(),
        MemoryStateStore::new("main"),
        fatal,
        NoThrottle,
    );
    handle.buffer_events(vec![insert("t1", 1, 100)]).await.unwrap();
    handle.stop();
    writer.run().await.unwrap();

    let statements = target.committed_statements();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].contains("\"app_v2\".\"accounts\""));
}

#[tokio::test]
async fn test_restart_replays_idempotently() {
    let store = Arc::new(SqliteStateStore::in_memory("main").unwrap());
    let events = vec![insert("t1", 1, 100), insert("t1", 2, 200)];

    for _ in 0..2 {
        let target = MockTarget::new();
        let (fatal, _signal) = ShutdownOnFatal::new();
        let (writer, handle) =
            BinlogWriter::new(config(10), target.clone(), store.clone(), fatal, NoThrottle);
        handle.buffer_events(events.clone()).await.unwrap();
        handle.stop();
        writer.run().await.unwrap();
        assert_eq!(target.committed().len(), 1);
    }

    assert_eq!(store.last_resumable_position().unwrap(), Some(pos(200)));
}

#[tokio::test]
async fn test_paused_throttle_holds_batches() {
    let target = MockTarget::new();
    let throttle = PauseThrottle::new();
    throttle.pause();
    let (fatal, _signal) = ShutdownOnFatal::new();
    let (writer, handle) = BinlogWriter::new(
        config(10),
        target.clone(),
        MemoryStateStore::new("main"),
        fatal,
        throttle.clone(),
    );

    let task = tokio::spawn(writer.run());
    handle.buffer_events(vec![insert("t1", 1, 100)]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(target.attempts(), 0);
    assert!(handle.last_processed_event_time().is_none());

    throttle.resume();
    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(target.committed().len(), 1);
    assert!(handle.last_processed_event_time().is_some());
}
