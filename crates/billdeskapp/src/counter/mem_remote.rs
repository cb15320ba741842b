use super::remote_backend::{state_fields, RemoteBackend, RemoteFields, RemoteWrite};
use crate::error::{BillingError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    document: Option<RemoteFields>,
    version: u64,
    /// Open transactions and the document version each one read.
    open: HashMap<String, Option<u64>>,
    failing_commits: usize,
    commit_outages: usize,
    simulate_failure: bool,
}

/// In-memory remote backend with optimistic concurrency.
///
/// Behaves like the real service where it matters for counters: a commit
/// fails with a conflict if the document changed after the transaction read
/// it, and creating an existing document conflicts too. Used by tests and
/// offline runs.
#[derive(Default)]
pub struct MemRemote {
    inner: Mutex<Inner>,
}

impl MemRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the service were unreachable.
    pub fn set_simulate_failure(&self, simulate: bool) {
        self.inner.lock().simulate_failure = simulate;
    }

    /// Reject the next `n` commits with a conflict.
    pub fn fail_next_commits(&self, n: usize) {
        self.inner.lock().failing_commits = n;
    }

    /// Fail the next `n` commits as unreachable, leaving their transactions
    /// open as a real service would.
    pub fn fail_next_commits_unavailable(&self, n: usize) {
        self.inner.lock().commit_outages = n;
    }

    /// Transactions begun and not yet committed or rolled back.
    pub fn open_transactions(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Current document fields, if the document exists.
    pub fn snapshot(&self) -> Option<RemoteFields> {
        self.inner.lock().document.clone()
    }

    /// Write fields directly, outside any transaction.
    pub fn put(&self, fields: &[(&str, i64)]) {
        let mut inner = self.inner.lock();
        let document = inner.document.get_or_insert_with(RemoteFields::new);
        for (name, value) in fields {
            document.insert(name.to_string(), *value);
        }
        inner.version += 1;
    }

    fn check_available(inner: &Inner) -> Result<()> {
        if inner.simulate_failure {
            return Err(BillingError::Remote("simulated outage".to_string()));
        }
        Ok(())
    }
}

impl RemoteBackend for MemRemote {
    fn begin(&self) -> Result<String> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        let txn = Uuid::new_v4().to_string();
        inner.open.insert(txn.clone(), None);
        Ok(txn)
    }

    fn get(&self, txn: Option<&str>) -> Result<Option<RemoteFields>> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        if let Some(txn) = txn {
            let version = inner.version;
            match inner.open.get_mut(txn) {
                Some(seen) => *seen = Some(version),
                None => return Err(BillingError::Remote(format!("unknown transaction {}", txn))),
            }
        }
        Ok(inner.document.clone())
    }

    fn commit(&self, txn: &str, write: RemoteWrite) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_available(&inner)?;
        if inner.commit_outages > 0 {
            inner.commit_outages -= 1;
            return Err(BillingError::Remote("simulated outage during commit".to_string()));
        }
        let seen = inner
            .open
            .remove(txn)
            .ok_or_else(|| BillingError::Remote(format!("unknown transaction {}", txn)))?;

        if inner.failing_commits > 0 {
            inner.failing_commits -= 1;
            return Err(BillingError::RemoteConflict("injected conflict".to_string()));
        }
        if matches!(seen, Some(version) if version != inner.version) {
            return Err(BillingError::RemoteConflict(
                "document changed since it was read".to_string(),
            ));
        }

        let updates: Vec<(&'static str, u64)> = match write {
            RemoteWrite::Create(state) => {
                if inner.document.is_some() {
                    return Err(BillingError::RemoteConflict(
                        "document already exists".to_string(),
                    ));
                }
                state_fields(&state).to_vec()
            }
            RemoteWrite::Merge { field, value } => vec![(field, value)],
            RemoteWrite::Set(state) => state_fields(&state).to_vec(),
        };

        let mut converted = Vec::with_capacity(updates.len());
        for (field, value) in updates {
            let value = i64::try_from(value).map_err(|_| BillingError::InvalidValue {
                field: field.to_string(),
                message: format!("counter {} exceeds storage range", value),
            })?;
            converted.push((field, value));
        }

        let document = inner.document.get_or_insert_with(RemoteFields::new);
        for (field, value) in converted {
            document.insert(field.to_string(), value);
        }
        inner.version += 1;
        Ok(())
    }

    fn rollback(&self, txn: &str) -> Result<()> {
        self.inner.lock().open.remove(txn);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
