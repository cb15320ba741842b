//! # Local Database
//!
//! Billdesk keeps documents and the local counter record in one SQLite file.
//! [`Database`] owns the connection and is shared (via `Arc`) by the local
//! counter store, the document store and the archive codec, so an archive
//! import can replace documents and counters in a single transaction.
//!
//! ## Locking
//!
//! Two layers serialise writers:
//!
//! 1. Inside a process, the connection sits behind a mutex. Only one closure
//!    runs against it at a time.
//! 2. Across processes (or several `Database` handles on the same file),
//!    every write runs in an `IMMEDIATE` transaction, which takes SQLite's
//!    write lock at `BEGIN`. A competing writer waits up to the busy timeout.
//!
//! Taking the lock at `BEGIN` rather than at the first `UPDATE` is what makes
//! read-increment-write on the counter row safe: no other writer can read the
//! row between our read and our write.
//!
//! ## Schema
//!
//! ```text
//! document_counter   single row (id = 1), one column per counter
//! invoices           items / levies stored as JSON text, decimals as text
//! receipts
//! waybills
//! ```

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS document_counter (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    invoice_counter INTEGER NOT NULL DEFAULT 1,
    receipt_counter INTEGER NOT NULL DEFAULT 1,
    waybill_counter INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY,
    document_number TEXT UNIQUE,
    customer_name TEXT NOT NULL,
    issue_date TEXT NOT NULL,
    classification TEXT NOT NULL DEFAULT '',
    items TEXT NOT NULL DEFAULT '[]',
    subtotal TEXT NOT NULL DEFAULT '0.00',
    levies TEXT NOT NULL DEFAULT '{}',
    grand_total TEXT NOT NULL DEFAULT '0.00',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS receipts (
    id INTEGER PRIMARY KEY,
    document_number TEXT UNIQUE,
    received_from TEXT NOT NULL,
    issue_date TEXT NOT NULL,
    amount TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    payment_method TEXT NOT NULL DEFAULT '',
    approved_by TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS waybills (
    id INTEGER PRIMARY KEY,
    document_number TEXT UNIQUE,
    customer_name TEXT NOT NULL,
    issue_date TEXT NOT NULL,
    destination TEXT NOT NULL,
    driver_name TEXT NOT NULL DEFAULT '',
    receiver_name TEXT NOT NULL DEFAULT '',
    items TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Private in-memory database, for tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = ?path, "database ready");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the connection without a write lock.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside an `IMMEDIATE` transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise
    /// (dropping an uncommitted `rusqlite::Transaction` rolls it back).
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
