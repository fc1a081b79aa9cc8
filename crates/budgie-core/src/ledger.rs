//! Persistent ledger of signed-cent records.
//!
//! The table is append-only: there is no update or delete path, and the
//! balance is always recomputed from the rows.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::Result;

/// Number of records reported by `!check`.
pub const RECENT_LIMIT: usize = 10;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id          INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    cents       INTEGER NOT NULL,
    author      TEXT NOT NULL,
    created_at  TIMESTAMP NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);";

const INSERT_SQL: &str = "INSERT INTO records (description, cents, author) VALUES (?1, ?2, ?3)";
const TOTAL_SQL: &str = "SELECT IFNULL(SUM(cents), 0) FROM records";
const RECENT_SQL: &str = "SELECT id, description, cents, author, created_at FROM records
     ORDER BY created_at DESC, id DESC LIMIT ?1";

/// One stored ledger entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub description: String,
    pub amount_cents: i64,
    pub author: String,
    /// Assigned by the store (UTC).
    pub created_at: NaiveDateTime,
}

/// Caller-supplied part of a record; id and timestamp come from the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRecord {
    pub description: String,
    pub amount_cents: i64,
    pub author: String,
}

/// Storage port for the ledger.
///
/// Calls block until the engine answers; async callers should run them on a
/// blocking thread.
pub trait LedgerStore: Send + Sync {
    fn append(&self, record: &NewRecord) -> Result<()>;

    /// Sum of all amounts; `0` for an empty ledger.
    fn total(&self) -> Result<i64>;

    /// Up to `n` records, newest first.
    fn recent(&self, n: usize) -> Result<Vec<Record>>;

    /// Append, then report the new total.
    ///
    /// The default is two independent calls, so the total may already include
    /// a concurrent writer's record.
    fn append_then_total(&self, record: &NewRecord) -> Result<i64> {
        self.append(record)?;
        self.total()
    }
}

/// SQLite-backed ledger sharing one connection between all handlers.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger at `path`.
    ///
    /// With `reset` set the existing table is dropped first. Only the
    /// operator's dev flag should ever pass `true`.
    pub fn open(path: &Path, reset: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::init(conn, reset)
    }

    /// Ephemeral ledger, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, false)
    }

    fn init(conn: Connection, reset: bool) -> Result<Self> {
        if reset {
            tracing::warn!("dev mode: dropping all ledger records");
            conn.execute_batch("DROP TABLE IF EXISTS records;")?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // A panic while holding the lock leaves SQLite consistent (open
    // transactions roll back on drop), so poisoning is ignored.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn insert(conn: &Connection, record: &NewRecord) -> Result<()> {
    conn.prepare_cached(INSERT_SQL)?.execute(params![
        record.description,
        record.amount_cents,
        record.author,
    ])?;
    Ok(())
}

fn sum(conn: &Connection) -> Result<i64> {
    let total = conn
        .prepare_cached(TOTAL_SQL)?
        .query_row([], |row| row.get::<_, i64>(0))?;
    Ok(total)
}

impl LedgerStore for SqliteLedger {
    fn append(&self, record: &NewRecord) -> Result<()> {
        insert(&self.conn(), record)
    }

    fn total(&self) -> Result<i64> {
        sum(&self.conn())
    }

    fn recent(&self, n: usize) -> Result<Vec<Record>> {
        let conn = self.conn();
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare_cached(RECENT_SQL)?;
        let records = stmt
            .query_map(params![limit], |row| {
                Ok(Record {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    amount_cents: row.get(2)?,
                    author: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Runs both statements in one transaction, so the reported total is
    /// exactly the state right after this append.
    fn append_then_total(&self, record: &NewRecord) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert(&tx, record)?;
        let total = sum(&tx)?;
        tx.commit()?;
        Ok(total)
    }
}
