//! # Document Store
//!
//! Persistence for invoices, receipts and waybills.
//!
//! `create_*` is the only place a document number is reserved. The number is
//! taken *before* the row is written and outside the write transaction: the
//! local counter store locks the same database, and a number that ends up
//! unused is an acceptable gap. If the reservation fails nothing is written.
//!
//! `update_*` never touches `document_number` or `created_at`.
//!
//! Storage encoding: decimals as text, dates as `YYYY-MM-DD`, timestamps as
//! RFC 3339, line items and levies as JSON text.

use crate::calculator::{calculate_totals, LevyRate};
use crate::counter::CounterStore;
use crate::db::Database;
use crate::error::{BillingError, Result};
use crate::model::{
    DocumentSet, DocumentType, Invoice, InvoiceDraft, Receipt, ReceiptDraft, Waybill,
    WaybillDraft,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::Arc;

const INVOICE_COLUMNS: &str = "id, document_number, customer_name, issue_date, classification, \
     items, subtotal, levies, grand_total, created_at, updated_at";
const RECEIPT_COLUMNS: &str = "id, document_number, received_from, issue_date, amount, \
     description, payment_method, approved_by, created_at, updated_at";
const WAYBILL_COLUMNS: &str = "id, document_number, customer_name, issue_date, destination, \
     driver_name, receiver_name, items, created_at, updated_at";

pub struct DocumentStore {
    db: Arc<Database>,
    counters: Arc<dyn CounterStore>,
    levies: Vec<LevyRate>,
}

impl DocumentStore {
    pub fn new(db: Arc<Database>, counters: Arc<dyn CounterStore>, levies: Vec<LevyRate>) -> Self {
        Self {
            db,
            counters,
            levies,
        }
    }

    // --- invoices ---

    pub fn create_invoice(&self, draft: InvoiceDraft) -> Result<Invoice> {
        let number = self.counters.reserve(DocumentType::Invoice)?;
        let totals = calculate_totals(&draft.items, &self.levies)?;
        let now = Utc::now();
        let mut invoice = Invoice {
            id: 0,
            document_number: Some(number),
            customer_name: draft.customer_name,
            issue_date: draft.issue_date,
            classification: draft.classification,
            items: draft.items,
            subtotal: totals.subtotal,
            levies: totals.levies,
            grand_total: totals.grand_total,
            created_at: now,
            updated_at: now,
        };
        let id = self.db.write(|tx| insert_invoice(tx, &invoice, false))?;
        invoice.id = id;
        tracing::info!(id = invoice.id, number = ?invoice.document_number, "invoice created");
        Ok(invoice)
    }

    pub fn get_invoice(&self, id: i64) -> Result<Invoice> {
        self.db
            .read(|conn| fetch_invoice(conn, id))?
            .ok_or(BillingError::NotFound { kind: "invoice", id })
    }

    pub fn list_invoices(&self) -> Result<Vec<Invoice>> {
        self.db.read(list_invoices)
    }

    /// Replace the user fields and recompute totals.
    pub fn update_invoice(&self, id: i64, draft: InvoiceDraft) -> Result<Invoice> {
        let totals = calculate_totals(&draft.items, &self.levies)?;
        self.db.write(|tx| {
            let mut invoice =
                fetch_invoice(tx, id)?.ok_or(BillingError::NotFound { kind: "invoice", id })?;
            invoice.customer_name = draft.customer_name;
            invoice.issue_date = draft.issue_date;
            invoice.classification = draft.classification;
            invoice.items = draft.items;
            invoice.subtotal = totals.subtotal;
            invoice.levies = totals.levies;
            invoice.grand_total = totals.grand_total;
            invoice.updated_at = Utc::now();
            tx.execute(
                "UPDATE invoices SET customer_name = ?1, issue_date = ?2, classification = ?3,
                    items = ?4, subtotal = ?5, levies = ?6, grand_total = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    invoice.customer_name,
                    invoice.issue_date.to_string(),
                    invoice.classification,
                    serde_json::to_string(&invoice.items)?,
                    invoice.subtotal.to_string(),
                    serde_json::to_string(&invoice.levies)?,
                    invoice.grand_total.to_string(),
                    invoice.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(invoice)
        })
    }

    pub fn delete_invoice(&self, id: i64) -> Result<()> {
        self.delete("invoices", "invoice", id)
    }

    // --- receipts ---

    pub fn create_receipt(&self, draft: ReceiptDraft) -> Result<Receipt> {
        let number = self.counters.reserve(DocumentType::Receipt)?;
        let now = Utc::now();
        let mut receipt = Receipt {
            id: 0,
            document_number: Some(number),
            received_from: draft.received_from,
            issue_date: draft.issue_date,
            amount: draft.amount,
            description: draft.description,
            payment_method: draft.payment_method,
            approved_by: draft.approved_by,
            created_at: now,
            updated_at: now,
        };
        let id = self.db.write(|tx| insert_receipt(tx, &receipt, false))?;
        receipt.id = id;
        tracing::info!(id = receipt.id, number = ?receipt.document_number, "receipt created");
        Ok(receipt)
    }

    pub fn get_receipt(&self, id: i64) -> Result<Receipt> {
        self.db
            .read(|conn| fetch_receipt(conn, id))?
            .ok_or(BillingError::NotFound { kind: "receipt", id })
    }

    pub fn list_receipts(&self) -> Result<Vec<Receipt>> {
        self.db.read(list_receipts)
    }

    pub fn update_receipt(&self, id: i64, draft: ReceiptDraft) -> Result<Receipt> {
        self.db.write(|tx| {
            let mut receipt =
                fetch_receipt(tx, id)?.ok_or(BillingError::NotFound { kind: "receipt", id })?;
            receipt.received_from = draft.received_from;
            receipt.issue_date = draft.issue_date;
            receipt.amount = draft.amount;
            receipt.description = draft.description;
            receipt.payment_method = draft.payment_method;
            receipt.approved_by = draft.approved_by;
            receipt.updated_at = Utc::now();
            tx.execute(
                "UPDATE receipts SET received_from = ?1, issue_date = ?2, amount = ?3,
                    description = ?4, payment_method = ?5, approved_by = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    receipt.received_from,
                    receipt.issue_date.to_string(),
                    receipt.amount.to_string(),
                    receipt.description,
                    receipt.payment_method,
                    receipt.approved_by,
                    receipt.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(receipt)
        })
    }

    pub fn delete_receipt(&self, id: i64) -> Result<()> {
        self.delete("receipts", "receipt", id)
    }

    // --- waybills ---

    pub fn create_waybill(&self, draft: WaybillDraft) -> Result<Waybill> {
        let number = self.counters.reserve(DocumentType::Waybill)?;
        let now = Utc::now();
        let mut waybill = Waybill {
            id: 0,
            document_number: Some(number),
            customer_name: draft.customer_name,
            issue_date: draft.issue_date,
            destination: draft.destination,
            driver_name: draft.driver_name,
            receiver_name: draft.receiver_name,
            items: draft.items,
            created_at: now,
            updated_at: now,
        };
        let id = self.db.write(|tx| insert_waybill(tx, &waybill, false))?;
        waybill.id = id;
        tracing::info!(id = waybill.id, number = ?waybill.document_number, "waybill created");
        Ok(waybill)
    }

    pub fn get_waybill(&self, id: i64) -> Result<Waybill> {
        self.db
            .read(|conn| fetch_waybill(conn, id))?
            .ok_or(BillingError::NotFound { kind: "waybill", id })
    }

    pub fn list_waybills(&self) -> Result<Vec<Waybill>> {
        self.db.read(list_waybills)
    }

    pub fn update_waybill(&self, id: i64, draft: WaybillDraft) -> Result<Waybill> {
        self.db.write(|tx| {
            let mut waybill =
                fetch_waybill(tx, id)?.ok_or(BillingError::NotFound { kind: "waybill", id })?;
            waybill.customer_name = draft.customer_name;
            waybill.issue_date = draft.issue_date;
            waybill.destination = draft.destination;
            waybill.driver_name = draft.driver_name;
            waybill.receiver_name = draft.receiver_name;
            waybill.items = draft.items;
            waybill.updated_at = Utc::now();
            tx.execute(
                "UPDATE waybills SET customer_name = ?1, issue_date = ?2, destination = ?3,
                    driver_name = ?4, receiver_name = ?5, items = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    waybill.customer_name,
                    waybill.issue_date.to_string(),
                    waybill.destination,
                    waybill.driver_name,
                    waybill.receiver_name,
                    serde_json::to_string(&waybill.items)?,
                    waybill.updated_at.to_rfc3339(),
                    id,
                ],
            )?;
            Ok(waybill)
        })
    }

    pub fn delete_waybill(&self, id: i64) -> Result<()> {
        self.delete("waybills", "waybill", id)
    }

    fn delete(&self, table: &str, kind: &'static str, id: i64) -> Result<()> {
        let removed = self.db.write(|tx| {
            Ok(tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?)
        })?;
        if removed == 0 {
            return Err(BillingError::NotFound { kind, id });
        }
        tracing::info!(kind, id, "document deleted");
        Ok(())
    }
}

/// Every stored document, ordered by id.
pub(crate) fn load_all(conn: &Connection) -> Result<DocumentSet> {
    Ok(DocumentSet {
        invoices: list_invoices(conn)?,
        receipts: list_receipts(conn)?,
        waybills: list_waybills(conn)?,
    })
}

/// Delete every document and insert `set` with its original ids.
pub(crate) fn replace_all(conn: &Connection, set: &DocumentSet) -> Result<()> {
    conn.execute_batch("DELETE FROM invoices; DELETE FROM receipts; DELETE FROM waybills;")?;
    for invoice in &set.invoices {
        insert_invoice(conn, invoice, true)?;
    }
    for receipt in &set.receipts {
        insert_receipt(conn, receipt, true)?;
    }
    for waybill in &set.waybills {
        insert_waybill(conn, waybill, true)?;
    }
    Ok(())
}

fn insert_invoice(conn: &Connection, invoice: &Invoice, keep_id: bool) -> Result<i64> {
    conn.execute(
        &format!("INSERT INTO invoices ({INVOICE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            keep_id.then_some(invoice.id),
            invoice.document_number,
            invoice.customer_name,
            invoice.issue_date.to_string(),
            invoice.classification,
            serde_json::to_string(&invoice.items)?,
            invoice.subtotal.to_string(),
            serde_json::to_string(&invoice.levies)?,
            invoice.grand_total.to_string(),
            invoice.created_at.to_rfc3339(),
            invoice.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_receipt(conn: &Connection, receipt: &Receipt, keep_id: bool) -> Result<i64> {
    conn.execute(
        &format!("INSERT INTO receipts ({RECEIPT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        params![
            keep_id.then_some(receipt.id),
            receipt.document_number,
            receipt.received_from,
            receipt.issue_date.to_string(),
            receipt.amount.to_string(),
            receipt.description,
            receipt.payment_method,
            receipt.approved_by,
            receipt.created_at.to_rfc3339(),
            receipt.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_waybill(conn: &Connection, waybill: &Waybill, keep_id: bool) -> Result<i64> {
    conn.execute(
        &format!("INSERT INTO waybills ({WAYBILL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        params![
            keep_id.then_some(waybill.id),
            waybill.document_number,
            waybill.customer_name,
            waybill.issue_date.to_string(),
            waybill.destination,
            waybill.driver_name,
            waybill.receiver_name,
            serde_json::to_string(&waybill.items)?,
            waybill.created_at.to_rfc3339(),
            waybill.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn fetch_invoice(conn: &Connection, id: i64) -> Result<Option<Invoice>> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], invoice_from_row).optional()?)
}

fn fetch_receipt(conn: &Connection, id: i64) -> Result<Option<Receipt>> {
    let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], receipt_from_row).optional()?)
}

fn fetch_waybill(conn: &Connection, id: i64) -> Result<Option<Waybill>> {
    let sql = format!("SELECT {WAYBILL_COLUMNS} FROM waybills WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], waybill_from_row).optional()?)
}

fn list_invoices(conn: &Connection) -> Result<Vec<Invoice>> {
    let mut stmt = conn.prepare(&format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY id"))?;
    let rows = stmt.query_map([], invoice_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn list_receipts(conn: &Connection) -> Result<Vec<Receipt>> {
    let mut stmt = conn.prepare(&format!("SELECT {RECEIPT_COLUMNS} FROM receipts ORDER BY id"))?;
    let rows = stmt.query_map([], receipt_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn list_waybills(conn: &Connection) -> Result<Vec<Waybill>> {
    let mut stmt = conn.prepare(&format!("SELECT {WAYBILL_COLUMNS} FROM waybills ORDER BY id"))?;
    let rows = stmt.query_map([], waybill_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        document_number: row.get(1)?,
        customer_name: row.get(2)?,
        issue_date: parsed(row, 3)?,
        classification: row.get(4)?,
        items: json(row, 5)?,
        subtotal: parsed(row, 6)?,
        levies: json(row, 7)?,
        grand_total: parsed(row, 8)?,
        created_at: parsed(row, 9)?,
        updated_at: parsed(row, 10)?,
    })
}

fn receipt_from_row(row: &Row<'_>) -> rusqlite::Result<Receipt> {
    Ok(Receipt {
        id: row.get(0)?,
        document_number: row.get(1)?,
        received_from: row.get(2)?,
        issue_date: parsed(row, 3)?,
        amount: parsed(row, 4)?,
        description: row.get(5)?,
        payment_method: row.get(6)?,
        approved_by: row.get(7)?,
        created_at: parsed(row, 8)?,
        updated_at: parsed(row, 9)?,
    })
}

fn waybill_from_row(row: &Row<'_>) -> rusqlite::Result<Waybill> {
    Ok(Waybill {
        id: row.get(0)?,
        document_number: row.get(1)?,
        customer_name: row.get(2)?,
        issue_date: parsed(row, 3)?,
        destination: row.get(4)?,
        driver_name: row.get(5)?,
        receiver_name: row.get(6)?,
        items: json(row, 7)?,
        created_at: parsed(row, 8)?,
        updated_at: parsed(row, 9)?,
    })
}

/// Text column parsed with `FromStr` (decimals, dates, timestamps).
fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
