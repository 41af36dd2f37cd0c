//! Cost-capped append-only log in a single SQLite file.
//!
//! Several processes may open the same file. Every insert runs in one
//! `BEGIN IMMEDIATE` transaction that evicts the oldest rows and appends
//! the new ones, so readers never see the cap violated.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, TransactionBehavior};
use tracing::debug;

use crate::StorageError;

/// How long a writer waits for another process's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack for floating point cost sums.
const COST_EPSILON: f64 = 1e-9;

/// One retained log item.
#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    /// Strictly increasing, never reused.
    pub rowid: i64,
    pub cost: f64,
    pub data: Vec<u8>,
}

/// SQLite-based cost-capped log.
///
/// Uses a Mutex for thread-safety since rusqlite Connection is not Sync.
pub struct SqliteLog {
    conn: Mutex<Connection>,
    max_cost: f64,
}

impl SqliteLog {
    /// Open (or create) the log at `path`. Existing rows are kept even if
    /// they exceed `max_cost`; the next insert restores the cap.
    pub fn open(path: impl AsRef<Path>, max_cost: f64) -> Result<Self, StorageError> {
        if !(max_cost.is_finite() && max_cost >= 0.0) {
            return Err(StorageError::InvalidConfig(format!(
                "max_cost must be finite and >= 0, got {}",
                max_cost
            )));
        }

        let path = path.as_ref();
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        // AUTOINCREMENT keeps rowids from being reused after eviction
        conn.execute(
            "CREATE TABLE IF NOT EXISTS log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cost REAL NOT NULL,
                data BLOB NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            max_cost,
        })
    }

    pub fn max_cost(&self) -> f64 {
        self.max_cost
    }

    /// Append `items` as `(cost, data)` pairs in one transaction, evicting
    /// the oldest rows only as far as needed for the batch to fit.
    ///
    /// A batch whose own cost exceeds the cap evicts everything and is
    /// stored anyway. Returns the rowids assigned, in order.
    pub fn insert<D: AsRef<[u8]>>(&self, items: &[(f64, D)]) -> Result<Vec<i64>, StorageError> {
        if let Some((cost, _)) = items.iter().find(|(c, _)| !(c.is_finite() && *c >= 0.0)) {
            return Err(StorageError::InvalidConfig(format!(
                "item cost must be finite and >= 0, got {}",
                cost
            )));
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let incoming: f64 = items.iter().map(|(c, _)| *c).sum();

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: f64 = tx.query_row(
            "SELECT COALESCE(SUM(cost), 0.0) FROM log",
            [],
            |row| row.get(0),
        )?;
        let mut excess = current + incoming - self.max_cost;

        if excess > COST_EPSILON {
            let mut last_evicted = None;
            let mut evicted = 0usize;
            {
                let mut stmt = tx.prepare_cached("SELECT id, cost FROM log ORDER BY id ASC")?;
                let mut rows = stmt.query([])?;
                while excess > COST_EPSILON {
                    let Some(row) = rows.next()? else { break };
                    let rowid: i64 = row.get(0)?;
                    let cost: f64 = row.get(1)?;
                    excess -= cost;
                    last_evicted = Some(rowid);
                    evicted += 1;
                }
            }
            if let Some(rowid) = last_evicted {
                tx.execute("DELETE FROM log WHERE id <= ?1", params![rowid])?;
                debug!(
                    evicted,
                    up_to = rowid,
                    incoming_cost = incoming,
                    "Evicted log items"
                );
            }
        }

        let mut rowids = Vec::with_capacity(items.len());
        {
            // Prepare the INSERT statement once and reuse it for the whole batch
            let mut stmt = tx.prepare_cached("INSERT INTO log (cost, data) VALUES (?1, ?2)")?;
            for (cost, data) in items {
                stmt.execute(params![cost, data.as_ref()])?;
                rowids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(rowids)
    }

    /// Every retained item in ascending rowid order.
    pub fn all(&self) -> Result<Vec<LogItem>, StorageError> {
        self.newer_than(i64::MIN)
    }

    /// Retained items with rowid strictly greater than `rowid`, ascending.
    pub fn newer_than(&self, rowid: i64) -> Result<Vec<LogItem>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, cost, data FROM log WHERE id > ?1 ORDER BY id ASC",
        )?;
        let items = stmt
            .query_map(params![rowid], |row| {
                Ok(LogItem {
                    rowid: row.get(0)?,
                    cost: row.get(1)?,
                    data: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Sum of the costs of retained items.
    pub fn total_cost(&self) -> Result<f64, StorageError> {
        let conn = self.lock()?;
        let total = conn.query_row("SELECT COALESCE(SUM(cost), 0.0) FROM log", [], |row| {
            row.get(0)
        })?;
        Ok(total)
    }

    /// Number of retained items.
    pub fn len(&self) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }
}
