use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;

use crate::model::Candle;

mod key;

pub use key::SeriesKey;

/// Append-only OHLCV storage, one SQLite table per series.
///
/// `known` caches the series already present in the database. It is loaded
/// once from `sqlite_master` at open and updated in memory as new series are
/// created; reopening the store rebuilds it from disk, so it is never the
/// source of truth.
pub struct SeriesStore {
    conn: Connection,
    known: HashSet<SeriesKey>,
}

impl SeriesStore {
    /// Open (or create) the database file. Failure here aborts the run
    /// before any pair is processed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let known = load_series_names(&conn)?;
        Ok(Self { conn, known })
    }

    /// Idempotently create storage for a series and register it.
    pub fn ensure_series(&mut self, key: &SeriesKey) -> Result<()> {
        if self.known.contains(key) {
            return Ok(());
        }
        self.conn
            .execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS "{key}" (
                    close_time_ms INTEGER PRIMARY KEY,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL
                )
                "#
            ))
            .with_context(|| format!("failed to create series {}", key))?;
        self.known.insert(key.clone());
        Ok(())
    }

    /// Highest stored close timestamp, or 0 for an empty or unknown series.
    pub fn watermark(&self, key: &SeriesKey) -> Result<u64> {
        if !self.known.contains(key) {
            return Ok(0);
        }
        let max: Option<i64> = self
            .conn
            .query_row(
                &format!(r#"SELECT MAX(close_time_ms) FROM "{key}""#),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to read watermark of {}", key))?;
        Ok(max.map(|v| v.max(0) as u64).unwrap_or(0))
    }

    /// Insert every candle newer than the current watermark in one
    /// transaction; returns the number of rows written.
    ///
    /// Candles at or below the watermark are redundant (sources return
    /// overlapping windows) and are dropped before the insert. A timestamp
    /// collision on insert is skipped, not an error.
    pub fn append_batch(&mut self, key: &SeriesKey, candles: &[Candle]) -> Result<usize> {
        let watermark = self.watermark(key)?;
        let fresh: Vec<&Candle> = candles
            .iter()
            .filter(|c| c.close_time_ms > watermark)
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                r#"
                INSERT OR IGNORE INTO "{key}" (close_time_ms, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#
            ))?;
            for c in fresh {
                inserted += stmt.execute(params![
                    c.close_time_ms as i64,
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Every known series, sorted for deterministic iteration.
    pub fn list_series(&self) -> Vec<SeriesKey> {
        let mut keys: Vec<SeriesKey> = self.known.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// All stored close timestamps in ascending order. An unknown series
    /// reads empty.
    pub fn read_ordered(&self, key: &SeriesKey) -> Result<Vec<u64>> {
        if !self.known.contains(key) {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT close_time_ms FROM "{key}" ORDER BY close_time_ms ASC"#
        ))?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut timestamps = Vec::new();
        for row in rows {
            timestamps.push(row?.max(0) as u64);
        }
        Ok(timestamps)
    }
}

fn load_series_names(conn: &Connection) -> Result<HashSet<SeriesKey>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .context("failed to scan existing series")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut known = HashSet::new();
    for row in rows {
        known.insert(SeriesKey::from_stored(&row?));
    }
    Ok(known)
}
