//! Interval sample persistence.

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::Serialize;

use super::models::TelemetrySample;
use crate::error::Result;

/// Destination for per-cycle traffic samples.
///
/// Calls may block; the poll loop runs them off the async workers and
/// bounds how long it waits.
pub trait SampleStore: Send + Sync {
    fn record(&self, sample: &TelemetrySample) -> Result<()>;

    fn record_all(&self, samples: &[TelemetrySample]) -> Result<()> {
        for sample in samples {
            self.record(sample)?;
        }
        Ok(())
    }
}

/// One stored row of `traffic_log`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficRow {
    pub ts: i64,
    pub client_name: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS traffic_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_name TEXT NOT NULL,
                ts INTEGER NOT NULL,
                bytes_in INTEGER NOT NULL,
                bytes_out INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_traffic_client_ts ON traffic_log (client_name, ts);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Samples at or after `since`, oldest first, optionally for one client
    pub fn query(&self, client_name: Option<&str>, since: i64) -> Result<Vec<TrafficRow>> {
        let conn = self.conn.lock();

        let rows = match client_name {
            Some(name) => {
                let mut stmt = conn.prepare(
                    "SELECT ts, client_name, bytes_in, bytes_out FROM traffic_log
                     WHERE client_name = ?1 AND ts >= ?2 ORDER BY ts, id",
                )?;
                let rows = stmt
                    .query_map(params![name, since], map_traffic_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT ts, client_name, bytes_in, bytes_out FROM traffic_log
                     WHERE ts >= ?1 ORDER BY ts, id",
                )?;
                let rows = stmt
                    .query_map(params![since], map_traffic_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        Ok(rows)
    }
}

fn map_traffic_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrafficRow> {
    Ok(TrafficRow {
        ts: row.get(0)?,
        client_name: row.get(1)?,
        bytes_in: row.get::<_, i64>(2)?.max(0) as u64,
        bytes_out: row.get::<_, i64>(3)?.max(0) as u64,
    })
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl SampleStore for SqliteStore {
    fn record(&self, sample: &TelemetrySample) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO traffic_log (client_name, ts, bytes_in, bytes_out) VALUES (?1, ?2, ?3, ?4)",
            params![
                sample.client_name,
                sample.timestamp,
                to_sql_count(sample.rx_delta),
                to_sql_count(sample.tx_delta)
            ],
        )?;
        Ok(())
    }

    fn record_all(&self, samples: &[TelemetrySample]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO traffic_log (client_name, ts, bytes_in, bytes_out) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for sample in samples {
                stmt.execute(params![
                    sample.client_name,
                    sample.timestamp,
                    to_sql_count(sample.rx_delta),
                    to_sql_count(sample.tx_delta)
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Keeps samples in memory; used by one-shot commands and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    samples: Mutex<Vec<TelemetrySample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<TelemetrySample> {
        self.samples.lock().clone()
    }
}

impl SampleStore for MemoryStore {
    fn record(&self, sample: &TelemetrySample) -> Result<()> {
        self.samples.lock().push(sample.clone());
        Ok(())
    }
}
