//! # Domain Model
//!
//! The three document types share one numbering scheme but nothing else: each
//! has its own table, its own fields and its own counter.
//!
//! ## Counters
//!
//! [`CounterState`] holds the *next available* integer for every
//! [`DocumentType`]. A fresh deployment starts every counter at 1, so the first
//! invoice is `INV-001`. The number of documents issued so far is therefore
//! `counter - 1`, which is what [`DocumentCounts`] reports.
//!
//! ## Documents
//!
//! [`Invoice`], [`Receipt`] and [`Waybill`] each carry a `document_number`
//! that is assigned exactly once, when the document is first persisted (see
//! [`crate::documents`]). Updates never touch it.
//!
//! Monetary fields are [`Decimal`]s. Their serde form is a string
//! (`"120.00"`), which keeps archives free of float rounding.

use crate::error::BillingError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The first value of every counter.
pub const DEFAULT_COUNTER_START: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Invoice,
    Receipt,
    Waybill,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::Invoice,
        DocumentType::Receipt,
        DocumentType::Waybill,
    ];

    /// Prefix used in formatted document numbers.
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentType::Invoice => "INV",
            DocumentType::Receipt => "REC",
            DocumentType::Waybill => "WAY",
        }
    }

    /// Name of the counter field, both as a SQL column and a remote document field.
    pub fn counter_field(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice_counter",
            DocumentType::Receipt => "receipt_counter",
            DocumentType::Waybill => "waybill_counter",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
            DocumentType::Waybill => "waybill",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.prefix() == prefix)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invoice" | "invoices" => Ok(DocumentType::Invoice),
            "receipt" | "receipts" => Ok(DocumentType::Receipt),
            "waybill" | "waybills" => Ok(DocumentType::Waybill),
            _ => Err(BillingError::UnknownDocumentType(s.to_string())),
        }
    }
}

/// The single counter record: next available value per document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub invoice_counter: u64,
    pub receipt_counter: u64,
    pub waybill_counter: u64,
}

impl Default for CounterState {
    fn default() -> Self {
        Self {
            invoice_counter: DEFAULT_COUNTER_START,
            receipt_counter: DEFAULT_COUNTER_START,
            waybill_counter: DEFAULT_COUNTER_START,
        }
    }
}

impl CounterState {
    pub fn get(&self, doc_type: DocumentType) -> u64 {
        match doc_type {
            DocumentType::Invoice => self.invoice_counter,
            DocumentType::Receipt => self.receipt_counter,
            DocumentType::Waybill => self.waybill_counter,
        }
    }

    pub fn set(&mut self, doc_type: DocumentType, value: u64) {
        match doc_type {
            DocumentType::Invoice => self.invoice_counter = value,
            DocumentType::Receipt => self.receipt_counter = value,
            DocumentType::Waybill => self.waybill_counter = value,
        }
    }

    /// Documents issued so far per type.
    pub fn counts(&self) -> DocumentCounts {
        DocumentCounts {
            invoice: self.invoice_counter.saturating_sub(1),
            receipt: self.receipt_counter.saturating_sub(1),
            waybill: self.waybill_counter.saturating_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCounts {
    pub invoice: u64,
    pub receipt: u64,
    pub waybill: u64,
}

impl DocumentCounts {
    pub fn get(&self, doc_type: DocumentType) -> u64 {
        match doc_type {
            DocumentType::Invoice => self.invoice,
            DocumentType::Receipt => self.receipt,
            DocumentType::Waybill => self.waybill,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippedItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub document_number: Option<String>,
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub classification: String,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub levies: BTreeMap<String, Decimal>,
    pub grand_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    pub document_number: Option<String>,
    pub received_from: String,
    pub issue_date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: String,
    pub approved_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waybill {
    pub id: i64,
    pub document_number: Option<String>,
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub destination: String,
    pub driver_name: String,
    pub receiver_name: String,
    pub items: Vec<ShippedItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-supplied fields of an invoice. Totals are always computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDraft {
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub classification: String,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDraft {
    pub received_from: String,
    pub issue_date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub payment_method: String,
    pub approved_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaybillDraft {
    pub customer_name: String,
    pub issue_date: NaiveDate,
    pub destination: String,
    pub driver_name: String,
    pub receiver_name: String,
    pub items: Vec<ShippedItem>,
}

/// Every stored document, as exported to or imported from an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    pub invoices: Vec<Invoice>,
    pub receipts: Vec<Receipt>,
    pub waybills: Vec<Waybill>,
}

impl DocumentSet {
    /// Document numbers of one type, in id order. Documents without a number are skipped.
    pub fn numbers(&self, doc_type: DocumentType) -> Vec<&str> {
        match doc_type {
            DocumentType::Invoice => self
                .invoices
                .iter()
                .filter_map(|d| d.document_number.as_deref())
                .collect(),
            DocumentType::Receipt => self
                .receipts
                .iter()
                .filter_map(|d| d.document_number.as_deref())
                .collect(),
            DocumentType::Waybill => self
                .waybills
                .iter()
                .filter_map(|d| d.document_number.as_deref())
                .collect(),
        }
    }
}
