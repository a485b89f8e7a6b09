//! Activity history persistence.
//!
//! Segments that outlive the minimum duration are written to a small
//! SQLite database keyed by segment id. A continuing segment re-persists
//! under the same id with a growing end time, so the table holds exactly
//! one row per segment.

use std::path::Path;

use log::debug;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::types::{BasicActivity, SegmentRecord};

/// History store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored row carries an activity flag outside the taxonomy.
    #[error("corrupt history row: unknown activity flag {0}")]
    UnknownFlag(i64),
}

/// Rows whose interval is at or below this are hidden from the curated
/// history view (brief segments are noise at display granularity).
pub const VALID_INTERVAL_MS: u64 = 10_000;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activity_history (
    id          INTEGER PRIMARY KEY,
    flag        INTEGER NOT NULL,
    name        TEXT NOT NULL,
    start_ms    INTEGER NOT NULL,
    end_ms      INTEGER NOT NULL,
    interval_ms INTEGER NOT NULL
);
";

/// SQLite-backed store of persisted activity segments.
///
/// The connection sits behind a mutex so receiver threads can share one
/// store handle.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Opens (or creates) the history database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for demos and tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces a segment row by id.
    pub fn insert(&self, record: &SegmentRecord) -> Result<(), StoreError> {
        debug!(
            "persisting segment {} ({}) {}..{}ms",
            record.id, record.label, record.start_ms, record.end_ms
        );
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO activity_history
                 (id, flag, name, start_ms, end_ms, interval_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.flag.index() as i64,
                record.label,
                record.start_ms as i64,
                record.end_ms as i64,
                record.interval_ms as i64,
            ],
        )?;
        Ok(())
    }

    /// Every persisted segment, oldest id first.
    pub fn get_all(&self) -> Result<Vec<SegmentRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, flag, name, start_ms, end_ms, interval_ms
             FROM activity_history ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::row_to_record)?;
        Self::collect(rows)
    }

    /// Segments long enough for the curated history view
    /// (`interval_ms` strictly above [`VALID_INTERVAL_MS`]).
    pub fn get_valid(&self) -> Result<Vec<SegmentRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, flag, name, start_ms, end_ms, interval_ms
             FROM activity_history WHERE interval_ms > ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![VALID_INTERVAL_MS as i64], Self::row_to_record)?;
        Self::collect(rows)
    }

    /// Removes every row.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.conn.lock().execute("DELETE FROM activity_history", [])?;
        Ok(())
    }

    /// Number of stored segments.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.conn
                .lock()
                .query_row("SELECT COUNT(*) FROM activity_history", [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// True when no segment has been persisted.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn row_to_record(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(i64, i64, String, i64, i64, i64)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn collect(
        rows: impl Iterator<Item = rusqlite::Result<(i64, i64, String, i64, i64, i64)>>,
    ) -> Result<Vec<SegmentRecord>, StoreError> {
        let mut out = Vec::new();
        for row in rows {
            let (id, flag, label, start_ms, end_ms, interval_ms) = row?;
            let flag = BasicActivity::from_index(flag as usize)
                .ok_or(StoreError::UnknownFlag(flag))?;
            out.push(SegmentRecord {
                id,
                flag,
                label,
                start_ms: start_ms as u64,
                end_ms: end_ms as u64,
                interval_ms: interval_ms as u64,
            });
        }
        Ok(out)
    }
}
