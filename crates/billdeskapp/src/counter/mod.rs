//! # Counter Stores
//!
//! Document numbers come from three monotonic counters. This module defines
//! the [`CounterStore`] contract and its two implementations:
//!
//! - [`local::LocalCounterStore`]: one row in the local SQLite database.
//!   Works offline, private to this install.
//! - [`remote::RemoteCounterStore`]: three fields of one remote document,
//!   shared by every install pointed at the same project. The transport is
//!   abstracted by [`remote_backend::RemoteBackend`] (Firestore over REST in
//!   production, [`mem_remote::MemRemote`] in tests).
//!
//! [`selector::select_counter_store`] picks one at start-up. The caller keeps
//! the returned `Arc<dyn CounterStore>` and hands it to whatever needs numbers;
//! there is no process-global store.
//!
//! ## Contract
//!
//! | Operation | Mutates | Notes |
//! |-----------|---------|-------|
//! | `peek`    | no      | Advisory. May be stale by the time it is used. |
//! | `reserve` | +1      | Atomic. Two calls never observe the same integer. |
//! | `counts`  | no      | `counter - 1` per type. |
//! | `state`   | no      | Whole counter record, used by archive export. |
//! | `restore_within` | all | Overwrites the record, used by archive import. |
//!
//! Every operation first makes sure the record exists (creating it with all
//! counters at 1), inside the same transaction as the operation itself.
//!
//! Numbers are gap tolerant: a reserved number whose document is never saved
//! is simply skipped.

use crate::error::Result;
use crate::model::{CounterState, DocumentCounts, DocumentType};
use rusqlite::Transaction;
use serde::Serialize;
use std::fmt;

pub mod local;
pub mod mem_remote;
pub mod remote;
pub mod remote_backend;
pub mod selector;

#[cfg(feature = "remote")]
pub mod firestore;

pub trait CounterStore: Send + Sync {
    /// The number the next `reserve` would return, without consuming it.
    fn peek(&self, doc_type: DocumentType) -> Result<String>;

    /// Atomically take the current value and advance the counter by one.
    fn reserve(&self, doc_type: DocumentType) -> Result<String>;

    /// Documents issued so far per type.
    fn counts(&self) -> Result<DocumentCounts>;

    /// The full counter record.
    fn state(&self) -> Result<CounterState>;

    /// Overwrite every counter as part of an archive import.
    ///
    /// `tx` is the local transaction the import runs in. Stores that keep
    /// counters in the local database write through it, so the counters
    /// commit or roll back together with the imported documents.
    fn restore_within(&self, tx: &Transaction<'_>, state: &CounterState) -> Result<()>;

    fn kind(&self) -> BackendKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}
