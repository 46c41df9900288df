use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use binreplay_config::{to_writer_config, ReplayConfig};
use binreplay_state::{CheckpointSink, SqliteStateStore};
use binreplay_target::PostgresTarget;
use binreplay_writer::{BinlogWriter, NoThrottle, ShutdownOnFatal, WriterHandle};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::feed::pump_events;

pub async fn cmd_run(config: ReplayConfig, events: Option<PathBuf>) -> Result<()> {
    let writer_config = to_writer_config(&config).context("Invalid configuration")?;
    let chunk_size = writer_config.batch_size;

    info!(stream = %config.state.stream, "Starting binlog replay");

    let state_path = config.state_path();
    let store = Arc::new(
        SqliteStateStore::open(&state_path, &config.state.stream)
            .with_context(|| format!("Failed to open state database: {}", state_path))?,
    );
    match store.last_resumable_position()? {
        Some(position) => info!(
            position = %position,
            "Resuming after last checkpoint; the feed should start at this position"
        ),
        None => info!("No checkpoint recorded for this stream"),
    }

    let target = PostgresTarget::connect(config.target_connection_string())
        .await
        .context("Failed to connect to target database")?;

    let (fatal, mut fatal_signal) = ShutdownOnFatal::new();
    let (writer, handle) = BinlogWriter::new(writer_config, target, store, fatal, NoThrottle);
    let mut writer_task = tokio::spawn(writer.run());

    let feed_task = spawn_feed(events, handle.clone(), chunk_size);
    let ctrl_c_task = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl-C, draining queued events");
                handle.stop();
            }
        })
    };

    let outcome = tokio::select! {
        joined = &mut writer_task => joined,
        Some(message) = fatal_signal.wait() => {
            warn!(reason = %message, "Shutting down after fatal error");
            feed_task.abort();
            (&mut writer_task).await
        }
    };
    ctrl_c_task.abort();

    outcome
        .context("Writer task panicked")?
        .context("Replication stopped after a fatal error")?;

    if feed_task.is_finished() {
        match feed_task.await {
            Ok(Ok(count)) => info!(events = count, "Replay finished"),
            Ok(Err(e)) => return Err(e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(e).context("Feed task panicked"),
        }
    } else {
        feed_task.abort();
        info!("Replay stopped before the feed was exhausted");
    }

    Ok(())
}

/// Pump the feed into the writer, then stop it so it drains and exits.
fn spawn_feed(
    events: Option<PathBuf>,
    handle: WriterHandle,
    chunk_size: usize,
) -> JoinHandle<Result<u64>> {
    tokio::spawn(async move {
        let result = match events {
            Some(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .with_context(|| format!("Failed to open event feed: {}", path.display()));
                match file {
                    Ok(file) => pump_events(file, &handle, chunk_size).await,
                    Err(e) => Err(e),
                }
            }
            None => pump_events(tokio::io::stdin(), &handle, chunk_size).await,
        };

        if let Err(ref e) = result {
            error!(error = %format!("{:#}", e), "Event feed failed");
        }
        handle.stop();
        result
    })
}
