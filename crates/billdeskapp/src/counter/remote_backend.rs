use crate::error::Result;
use crate::model::{CounterState, DocumentType};
use std::collections::BTreeMap;

/// Raw integer fields of the remote counter document.
pub type RemoteFields = BTreeMap<String, i64>;

/// A write staged inside a remote transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Create the document; fails with a conflict if it already exists.
    Create(CounterState),
    /// Patch a single field, leaving the others untouched.
    Merge { field: &'static str, value: u64 },
    /// Overwrite every counter field.
    Set(CounterState),
}

/// Transport for the remote counter document.
///
/// This is the "how" under [`super::remote::RemoteCounterStore`]. A backend
/// offers optimistic transactions over exactly one document: `begin` opens
/// one, `get` reads inside it (or outside it when `txn` is `None`), and
/// `commit` applies a single write. If anything the transaction read changed
/// in between, `commit` fails with [`crate::error::BillingError::RemoteConflict`]
/// and the caller starts over.
pub trait RemoteBackend: Send + Sync {
    fn begin(&self) -> Result<String>;

    fn get(&self, txn: Option<&str>) -> Result<Option<RemoteFields>>;

    fn commit(&self, txn: &str, write: RemoteWrite) -> Result<()>;

    /// Abandon a transaction. Best effort.
    fn rollback(&self, txn: &str) -> Result<()>;

    /// Human-readable location of the document, for logs.
    fn describe(&self) -> String;
}

/// Field name and value for every counter of `state`.
pub fn state_fields(state: &CounterState) -> [(&'static str, u64); 3] {
    DocumentType::ALL.map(|t| (t.counter_field(), state.get(t)))
}
