//! Counter store over a single shared remote document.
//!
//! Every operation is one optimistic transaction against the
//! [`RemoteBackend`]: begin, read the document, decide, commit at most one
//! write. When the commit reports a conflict, the whole attempt is repeated
//! from a fresh read after an exponential backoff. Nothing is ever guessed:
//! if the retries run out the caller gets an error, not a number.

use super::remote_backend::{RemoteBackend, RemoteFields, RemoteWrite};
use super::{BackendKind, CounterStore};
use crate::error::{BillingError, Result};
use crate::model::{CounterState, DocumentCounts, DocumentType, DEFAULT_COUNTER_START};
use crate::numbering::NumberFormat;
use rusqlite::Transaction;
use std::time::Duration;

/// Backoff policy for conflicted remote transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = no retries)
    pub max_retries: usize,
    /// Base delay in milliseconds, doubled per attempt
    pub base_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 10,
            max_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub(crate) fn calculate_delay(&self, attempt: usize) -> Duration {
        let shift = attempt.min(63);
        let delay_ms = self.base_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

pub struct RemoteCounterStore<B: RemoteBackend> {
    backend: B,
    format: NumberFormat,
    retry: RetryConfig,
}

impl<B: RemoteBackend> RemoteCounterStore<B> {
    pub fn new(backend: B, format: NumberFormat, retry: RetryConfig) -> Self {
        Self {
            backend,
            format,
            retry,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get-or-create the counter document and return its state.
    pub fn ensure_document(&self) -> Result<CounterState> {
        self.run_transaction(|fields| match fields {
            Some(fields) => Ok((state_from_fields(fields)?, None)),
            None => {
                let state = CounterState::default();
                Ok((state, Some(RemoteWrite::Create(state))))
            }
        })
    }

    /// Run `body` in a fresh transaction, retrying the whole attempt on conflict.
    fn run_transaction<T>(
        &self,
        body: impl Fn(Option<&RemoteFields>) -> Result<(T, Option<RemoteWrite>)>,
    ) -> Result<T> {
        for attempt in 0..=self.retry.max_retries {
            match self.attempt(&body) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() && attempt < self.retry.max_retries => {
                    let delay = self.retry.calculate_delay(attempt);
                    tracing::debug!(attempt, ?delay, error = %e, "remote counter conflict, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(attempts = attempt + 1, "remote counter retries exhausted");
                    return Err(BillingError::Remote(format!(
                        "transaction aborted after {} attempts: {}",
                        attempt + 1,
                        e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
        Err(BillingError::Remote(
            "retry loop exited without a result".to_string(),
        ))
    }

    fn attempt<T>(
        &self,
        body: &impl Fn(Option<&RemoteFields>) -> Result<(T, Option<RemoteWrite>)>,
    ) -> Result<T> {
        let txn = self.backend.begin()?;
        let outcome = self
            .backend
            .get(Some(&txn))
            .and_then(|fields| body(fields.as_ref()));
        match outcome {
            Ok((value, Some(write))) => match self.backend.commit(&txn, write) {
                Ok(()) => Ok(value),
                // a conflicting commit has already ended the transaction
                Err(e) if e.is_conflict() => Err(e),
                Err(e) => {
                    self.release(&txn);
                    Err(e)
                }
            },
            Ok((value, None)) => {
                self.release(&txn);
                Ok(value)
            }
            Err(e) => {
                self.release(&txn);
                Err(e)
            }
        }
    }

    fn release(&self, txn: &str) {
        if let Err(e) = self.backend.rollback(txn) {
            tracing::debug!(error = %e, "remote rollback failed");
        }
    }
}

impl<B: RemoteBackend> CounterStore for RemoteCounterStore<B> {
    fn peek(&self, doc_type: DocumentType) -> Result<String> {
        let state = self.ensure_document()?;
        Ok(self.format.format(doc_type, state.get(doc_type)))
    }

    fn reserve(&self, doc_type: DocumentType) -> Result<String> {
        let field = doc_type.counter_field();
        let value = self.run_transaction(|fields| {
            let mut state = match fields {
                Some(fields) => state_from_fields(fields)?,
                None => CounterState::default(),
            };
            let current = state.get(doc_type);
            let next = current.checked_add(1).ok_or_else(|| BillingError::InvalidValue {
                field: field.to_string(),
                message: "counter overflow".to_string(),
            })?;
            let write = if fields.is_some() {
                RemoteWrite::Merge { field, value: next }
            } else {
                state.set(doc_type, next);
                RemoteWrite::Create(state)
            };
            Ok((current, Some(write)))
        })?;
        tracing::debug!(doc_type = %doc_type, value, "reserved remote document number");
        Ok(self.format.format(doc_type, value))
    }

    fn counts(&self) -> Result<DocumentCounts> {
        Ok(self.ensure_document()?.counts())
    }

    fn state(&self) -> Result<CounterState> {
        self.ensure_document()
    }

    /// The local transaction is not involved: the remote document is
    /// overwritten in its own transaction and is not rolled back if the
    /// local import fails afterwards.
    fn restore_within(&self, _tx: &Transaction<'_>, state: &CounterState) -> Result<()> {
        let state = *state;
        self.run_transaction(|_| Ok(((), Some(RemoteWrite::Set(state)))))?;
        tracing::info!(backend = %self.backend.describe(), "remote counters restored");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }
}

/// Read the counter fields, treating a missing field as a fresh counter.
pub(crate) fn state_from_fields(fields: &RemoteFields) -> Result<CounterState> {
    let mut state = CounterState::default();
    for doc_type in DocumentType::ALL {
        let field = doc_type.counter_field();
        let raw = fields
            .get(field)
            .copied()
            .unwrap_or(DEFAULT_COUNTER_START as i64);
        let value = u64::try_from(raw).map_err(|_| BillingError::InvalidValue {
            field: field.to_string(),
            message: format!("negative counter {}", raw),
        })?;
        state.set(doc_type, value);
    }
    Ok(state)
}
