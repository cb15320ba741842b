use super::{BackendKind, CounterStore};
use crate::db::Database;
use crate::error::{BillingError, Result};
use crate::model::{CounterState, DocumentCounts, DocumentType};
use crate::numbering::NumberFormat;
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};
use std::sync::Arc;

/// Counter store backed by the `document_counter` row of the local database.
pub struct LocalCounterStore {
    db: Arc<Database>,
    format: NumberFormat,
}

impl LocalCounterStore {
    pub fn new(db: Arc<Database>, format: NumberFormat) -> Self {
        Self { db, format }
    }
}

impl CounterStore for LocalCounterStore {
    fn peek(&self, doc_type: DocumentType) -> Result<String> {
        let state = self.db.write(|tx| ensure_row(tx))?;
        Ok(self.format.format(doc_type, state.get(doc_type)))
    }

    fn reserve(&self, doc_type: DocumentType) -> Result<String> {
        let field = doc_type.counter_field();
        let value = self.db.write(|tx| {
            let current = ensure_row(tx)?.get(doc_type);
            let next = current.checked_add(1).ok_or_else(|| BillingError::InvalidValue {
                field: field.to_string(),
                message: "counter overflow".to_string(),
            })?;
            tx.execute(
                &format!("UPDATE document_counter SET {field} = ?1, updated_at = ?2 WHERE id = 1"),
                params![to_sql(next, field)?, Utc::now().to_rfc3339()],
            )?;
            Ok(current)
        })?;
        tracing::debug!(doc_type = %doc_type, value, "reserved local document number");
        Ok(self.format.format(doc_type, value))
    }

    fn counts(&self) -> Result<DocumentCounts> {
        Ok(self.state()?.counts())
    }

    fn state(&self) -> Result<CounterState> {
        self.db.write(|tx| ensure_row(tx))
    }

    fn restore_within(&self, tx: &Transaction<'_>, state: &CounterState) -> Result<()> {
        write_row(tx, state)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

/// Get-or-create the counter row and return its values.
pub(crate) fn ensure_row(conn: &Connection) -> Result<CounterState> {
    conn.execute(
        "INSERT OR IGNORE INTO document_counter
            (id, invoice_counter, receipt_counter, waybill_counter, created_at, updated_at)
         VALUES (1, 1, 1, 1, ?1, ?1)",
        params![Utc::now().to_rfc3339()],
    )?;
    let (invoice, receipt, waybill): (i64, i64, i64) = conn.query_row(
        "SELECT invoice_counter, receipt_counter, waybill_counter FROM document_counter WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(CounterState {
        invoice_counter: from_sql(invoice, "invoice_counter")?,
        receipt_counter: from_sql(receipt, "receipt_counter")?,
        waybill_counter: from_sql(waybill, "waybill_counter")?,
    })
}

/// Upsert the counter row with the given values.
pub(crate) fn write_row(conn: &Connection, state: &CounterState) -> Result<()> {
    conn.execute(
        "INSERT INTO document_counter
            (id, invoice_counter, receipt_counter, waybill_counter, created_at, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(id) DO UPDATE SET
            invoice_counter = excluded.invoice_counter,
            receipt_counter = excluded.receipt_counter,
            waybill_counter = excluded.waybill_counter,
            updated_at = excluded.updated_at",
        params![
            to_sql(state.invoice_counter, "invoice_counter")?,
            to_sql(state.receipt_counter, "receipt_counter")?,
            to_sql(state.waybill_counter, "waybill_counter")?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn from_sql(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| BillingError::InvalidValue {
        field: field.to_string(),
        message: format!("negative counter {}", value),
    })
}

fn to_sql(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| BillingError::InvalidValue {
        field: field.to_string(),
        message: format!("counter {} exceeds storage range", value),
    })
}
