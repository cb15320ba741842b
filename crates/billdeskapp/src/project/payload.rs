//! JSON members of a project archive.
//!
//! Export writes the model types as they are. Import reads lenient records:
//! every field except `id` may be missing or null and falls back to an empty
//! value, today's date or the current time. Malformed values (an unparseable
//! date, a negative counter) are rejected.

use crate::error::ImportError;
use crate::model::{
    CounterState, DocumentSet, DocumentType, Invoice, LineItem, Receipt, ShippedItem, Waybill,
    DEFAULT_COUNTER_START,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

pub const METADATA_MEMBER: &str = "metadata.json";
pub const PROJECT_MEMBER: &str = "project.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub schema_version: u32,
    pub exported_at: String,
    pub app_version: String,
}

#[derive(Serialize)]
pub(crate) struct ProjectPayload<'a> {
    pub counters: &'a CounterState,
    pub invoices: &'a [Invoice],
    pub receipts: &'a [Receipt],
    pub waybills: &'a [Waybill],
}

/// Counters and documents read from `project.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportedProject {
    pub counters: CounterState,
    pub documents: DocumentSet,
}

/// Reject anything but the expected schema version. A missing field counts as a mismatch.
pub(crate) fn check_schema_version(metadata: &Value, expected: u32) -> Result<(), ImportError> {
    let found = metadata.get("schema_version").unwrap_or(&Value::Null);
    let matches = found
        .as_f64()
        .is_some_and(|v| v == f64::from(expected));
    if matches {
        Ok(())
    } else {
        Err(ImportError::UnsupportedSchema {
            found: found.to_string(),
            expected,
        })
    }
}

#[derive(Deserialize)]
struct ProjectRecord {
    #[serde(default)]
    counters: Option<CountersRecord>,
    #[serde(default)]
    invoices: Option<Vec<InvoiceRecord>>,
    #[serde(default)]
    receipts: Option<Vec<ReceiptRecord>>,
    #[serde(default)]
    waybills: Option<Vec<WaybillRecord>>,
}

#[derive(Deserialize, Default)]
struct CountersRecord {
    #[serde(default)]
    invoice_counter: Option<u64>,
    #[serde(default)]
    receipt_counter: Option<u64>,
    #[serde(default)]
    waybill_counter: Option<u64>,
}

#[derive(Deserialize)]
struct InvoiceRecord {
    id: i64,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    issue_date: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    items: Option<Vec<LineItem>>,
    #[serde(default)]
    subtotal: Option<Decimal>,
    #[serde(default)]
    levies: Option<BTreeMap<String, Decimal>>,
    #[serde(default)]
    grand_total: Option<Decimal>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Deserialize)]
struct ReceiptRecord {
    id: i64,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    received_from: Option<String>,
    #[serde(default)]
    issue_date: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    payment_method: Option<String>,
    #[serde(default)]
    approved_by: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Deserialize)]
struct WaybillRecord {
    id: i64,
    #[serde(default)]
    document_number: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    issue_date: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    driver_name: Option<String>,
    #[serde(default)]
    receiver_name: Option<String>,
    #[serde(default)]
    items: Option<Vec<ShippedItem>>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Defaults for missing dates and timestamps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fallbacks {
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

impl Fallbacks {
    pub fn current() -> Self {
        let now = Utc::now();
        Self {
            today: now.date_naive(),
            now,
        }
    }
}

pub(crate) fn parse_project(value: Value, fallbacks: Fallbacks) -> Result<ImportedProject, ImportError> {
    let record: ProjectRecord = serde_json::from_value(value)
        .map_err(|e| ImportError::InvalidPayload(e.to_string()))?;

    let counters = record.counters.unwrap_or_default();
    let mut state = CounterState::default();
    for (doc_type, raw) in [
        (DocumentType::Invoice, counters.invoice_counter),
        (DocumentType::Receipt, counters.receipt_counter),
        (DocumentType::Waybill, counters.waybill_counter),
    ] {
        let value = raw.unwrap_or(DEFAULT_COUNTER_START);
        if value < DEFAULT_COUNTER_START {
            return Err(ImportError::InvalidPayload(format!(
                "{} must be at least {}",
                doc_type.counter_field(),
                DEFAULT_COUNTER_START
            )));
        }
        state.set(doc_type, value);
    }

    let f = fallbacks;
    let invoices = record
        .invoices
        .unwrap_or_default()
        .into_iter()
        .map(|r| -> Result<Invoice, ImportError> {
            let ctx = ("invoice", r.id);
            Ok(Invoice {
                id: r.id,
                document_number: r.document_number,
                customer_name: r.customer_name.unwrap_or_default(),
                issue_date: date_or(r.issue_date, f.today, ctx)?,
                classification: r.classification.unwrap_or_default(),
                items: r.items.unwrap_or_default(),
                subtotal: r.subtotal.unwrap_or_default(),
                levies: r.levies.unwrap_or_default(),
                grand_total: r.grand_total.unwrap_or_default(),
                created_at: timestamp_or(r.created_at, f.now, ctx)?,
                updated_at: timestamp_or(r.updated_at, f.now, ctx)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let receipts = record
        .receipts
        .unwrap_or_default()
        .into_iter()
        .map(|r| -> Result<Receipt, ImportError> {
            let ctx = ("receipt", r.id);
            Ok(Receipt {
                id: r.id,
                document_number: r.document_number,
                received_from: r.received_from.unwrap_or_default(),
                issue_date: date_or(r.issue_date, f.today, ctx)?,
                amount: r.amount.unwrap_or_default(),
                description: r.description.unwrap_or_default(),
                payment_method: r.payment_method.unwrap_or_default(),
                approved_by: r.approved_by.unwrap_or_default(),
                created_at: timestamp_or(r.created_at, f.now, ctx)?,
                updated_at: timestamp_or(r.updated_at, f.now, ctx)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let waybills = record
        .waybills
        .unwrap_or_default()
        .into_iter()
        .map(|r| -> Result<Waybill, ImportError> {
            let ctx = ("waybill", r.id);
            Ok(Waybill {
                id: r.id,
                document_number: r.document_number,
                customer_name: r.customer_name.unwrap_or_default(),
                issue_date: date_or(r.issue_date, f.today, ctx)?,
                destination: r.destination.unwrap_or_default(),
                driver_name: r.driver_name.unwrap_or_default(),
                receiver_name: r.receiver_name.unwrap_or_default(),
                items: r.items.unwrap_or_default(),
                created_at: timestamp_or(r.created_at, f.now, ctx)?,
                updated_at: timestamp_or(r.updated_at, f.now, ctx)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    check_unique("invoice", invoices.iter().map(|d| (d.id, d.document_number.as_deref())))?;
    check_unique("receipt", receipts.iter().map(|d| (d.id, d.document_number.as_deref())))?;
    check_unique("waybill", waybills.iter().map(|d| (d.id, d.document_number.as_deref())))?;

    Ok(ImportedProject {
        counters: state,
        documents: DocumentSet {
            invoices,
            receipts,
            waybills,
        },
    })
}

fn check_unique<'a>(
    kind: &str,
    docs: impl Iterator<Item = (i64, Option<&'a str>)>,
) -> Result<(), ImportError> {
    let mut ids = HashSet::new();
    let mut numbers = HashSet::new();
    for (id, number) in docs {
        if !ids.insert(id) {
            return Err(ImportError::InvalidPayload(format!("duplicate {} id {}", kind, id)));
        }
        if let Some(number) = number {
            if !numbers.insert(number) {
                return Err(ImportError::InvalidPayload(format!(
                    "duplicate {} number {}",
                    kind, number
                )));
            }
        }
    }
    Ok(())
}

fn date_or(
    value: Option<String>,
    fallback: NaiveDate,
    (kind, id): (&str, i64),
) -> Result<NaiveDate, ImportError> {
    let Some(text) = value.filter(|s| !s.trim().is_empty()) else {
        return Ok(fallback);
    };
    parse_date(text.trim()).ok_or_else(|| {
        ImportError::InvalidPayload(format!("{} {}: invalid issue_date '{}'", kind, id, text))
    })
}

fn timestamp_or(
    value: Option<String>,
    fallback: DateTime<Utc>,
    (kind, id): (&str, i64),
) -> Result<DateTime<Utc>, ImportError> {
    let Some(text) = value.filter(|s| !s.trim().is_empty()) else {
        return Ok(fallback);
    };
    parse_timestamp(text.trim()).ok_or_else(|| {
        ImportError::InvalidPayload(format!("{} {}: invalid timestamp '{}'", kind, id, text))
    })
}

/// `YYYY-MM-DD`, or the date part of a full timestamp.
fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(text).map(|ts| ts.date_naive()))
}

/// RFC 3339 with any offset; timestamps without an offset are taken as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}
