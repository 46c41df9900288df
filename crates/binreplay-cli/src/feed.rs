use anyhow::{Context, Result};
use binreplay_core::ChangeEvent;
use binreplay_writer::WriterHandle;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info};

/// Read newline-delimited JSON change events from `reader` and queue them on
/// the writer, `chunk_size` events at a time.
///
/// Blank lines are skipped. Returns the number of events queued.
pub async fn pump_events<R>(reader: R, handle: &WriterHandle, chunk_size: usize) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut lines = BufReader::new(reader).lines();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut line_no: u64 = 0;
    let mut queued: u64 = 0;

    while let Some(line) = lines.next_line().await.context("Failed to read event feed")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ChangeEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid change event on line {}", line_no))?;
        chunk.push(event);

        if chunk.len() >= chunk_size {
            queued += flush(handle, &mut chunk).await?;
        }
    }

    queued += flush(handle, &mut chunk).await?;
    info!(events = queued, lines = line_no, "Event feed finished");
    Ok(queued)
}

async fn flush(handle: &WriterHandle, chunk: &mut Vec<ChangeEvent>) -> Result<u64> {
    if chunk.is_empty() {
        return Ok(0);
    }
    let count = chunk.len() as u64;
    debug!(count, "Queueing events");
    handle
        .buffer_events(std::mem::take(chunk))
        .await
        .context("Writer stopped accepting events")?;
    Ok(count)
}
