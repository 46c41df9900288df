use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use binreplay_core::BinlogPosition;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::{advances, CheckpointSink};

const CREATE_CHECKPOINTS: &str = "CREATE TABLE IF NOT EXISTS checkpoints (
    stream TEXT PRIMARY KEY,
    log_file TEXT NOT NULL,
    log_offset INTEGER NOT NULL,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
)";

/// SQLite-backed checkpoint store. One row per replay stream.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
    stream: String,
}

impl SqliteStateStore {
    /// Open or create a state store at the given path.
    pub fn open(path: impl AsRef<Path>, stream: impl Into<String>) -> StateResult<Self> {
        let path = path.as_ref();
        let stream = stream.into();
        info!(path = %path.display(), stream = %stream, "Opening state store");

        let conn = Connection::open(path)?;
        conn.execute(CREATE_CHECKPOINTS, [])?;

        Ok(Self {
            conn: Mutex::new(conn),
            stream,
        })
    }

    /// Open an existing state store for inspection.
    ///
    /// Nothing is created: a missing file is an error and the connection
    /// refuses writes.
    pub fn open_read_only(path: impl AsRef<Path>, stream: impl Into<String>) -> StateResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StateError::NotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "Opening state store read-only");

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        Ok(Self {
            conn: Mutex::new(conn),
            stream: stream.into(),
        })
    }

    /// Create an in-memory state store (for testing).
    pub fn in_memory(stream: impl Into<String>) -> StateResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_CHECKPOINTS, [])?;

        Ok(Self {
            conn: Mutex::new(conn),
            stream: stream.into(),
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Get the checkpoints of every stream in this store.
    pub fn all_checkpoints(&self) -> StateResult<Vec<(String, BinlogPosition)>> {
        let conn = self.lock();

        let mut stmt =
            conn.prepare("SELECT stream, log_file, log_offset FROM checkpoints ORDER BY stream")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (stream, file, offset) = row?;
            result.push((stream, to_position(file, offset)?));
        }

        Ok(result)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_position(file: String, offset: i64) -> StateResult<BinlogPosition> {
    let offset = u64::try_from(offset)
        .map_err(|_| StateError::Corrupt(format!("negative offset {} in {}", offset, file)))?;
    Ok(BinlogPosition::new(file, offset))
}

fn read_position(conn: &Connection, stream: &str) -> StateResult<Option<BinlogPosition>> {
    let row = conn
        .query_row(
            "SELECT log_file, log_offset FROM checkpoints WHERE stream = ?1",
            [stream],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    row.map(|(file, offset)| to_position(file, offset))
        .transpose()
}

impl CheckpointSink for SqliteStateStore {
    fn record_resumable_position(&self, position: &BinlogPosition) -> StateResult<()> {
        let offset = i64::try_from(position.offset)
            .map_err(|_| StateError::Corrupt(format!("offset {} out of range", position.offset)))?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let recorded = read_position(&tx, &self.stream)?;
        if !advances(&self.stream, recorded.as_ref(), position)? {
            debug!(stream = %self.stream, position = %position, "Checkpoint unchanged");
            return Ok(());
        }

        tx.execute(
            "INSERT INTO checkpoints (stream, log_file, log_offset, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(stream) DO UPDATE SET
                log_file = ?2,
                log_offset = ?3,
                updated_at = CURRENT_TIMESTAMP",
            rusqlite::params![self.stream, position.file, offset],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn last_resumable_position(&self) -> StateResult<Option<BinlogPosition>> {
        let conn = self.lock();
        read_position(&conn, &self.stream)
    }
}
