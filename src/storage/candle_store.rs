// =============================================================================
// SQLite candle store — idempotent OHLCV persistence
// =============================================================================
//
// Rows are keyed by (symbol, timeframe, timestamp).  Inserting a row that
// already exists is a no-op, so the persistence loop can hand over the full
// resample output every cycle without creating duplicates.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::market_data::Timeframe;
use crate::storage::CandleSink;
use crate::types::Candle;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ohlc_data (
    symbol      TEXT    NOT NULL,
    timeframe   TEXT    NOT NULL,
    timestamp   INTEGER NOT NULL,
    open        REAL    NOT NULL,
    high        REAL    NOT NULL,
    low         REAL    NOT NULL,
    close       REAL    NOT NULL,
    volume      REAL    NOT NULL,
    tick_count  INTEGER NOT NULL DEFAULT 0,
    UNIQUE(symbol, timeframe, timestamp)
);";

pub struct CandleStore {
    conn: Mutex<Connection>,
}

impl CandleStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open candle DB at {}", path.display()))?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "candle DB ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory candle DB")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create ohlc_data table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert candles, ignoring rows that already exist.  Returns the number
    /// of rows actually written.
    pub fn insert_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("failed to begin candle transaction")?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO ohlc_data
                 (symbol, timeframe, timestamp, open, high, low, close, volume, tick_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for c in candles {
                inserted += stmt.execute(params![
                    symbol,
                    timeframe.label(),
                    c.interval_start.timestamp_millis(),
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume,
                    c.tick_count as i64,
                ])?;
            }
        }
        tx.commit().context("failed to commit candle transaction")?;
        Ok(inserted)
    }

    pub fn count(&self, symbol: &str, timeframe: Timeframe) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ohlc_data WHERE symbol = ?1 AND timeframe = ?2",
            params![symbol, timeframe.label()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Most recent `limit` candles, oldest first.
    pub fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> Result<Vec<Candle>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, open, high, low, close, volume, tick_count
             FROM ohlc_data
             WHERE symbol = ?1 AND timeframe = ?2
             ORDER BY timestamp DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![symbol, timeframe.label(), limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut candles = Vec::new();
        for row in rows {
            let (ts, open, high, low, close, volume, tick_count) = row?;
            let interval_start = Utc
                .timestamp_millis_opt(ts)
                .single()
                .with_context(|| format!("stored timestamp {ts} out of range"))?;
            candles.push(Candle {
                interval_start,
                open,
                high,
                low,
                close,
                volume,
                tick_count: tick_count.max(0) as u64,
            });
        }
        candles.reverse();
        Ok(candles)
    }
}

impl CandleSink for CandleStore {
    fn persist(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<usize> {
        self.insert_candles(symbol, timeframe, candles)
    }
}
