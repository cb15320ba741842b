use crate::counter::local::LocalCounterStore;
use crate::db::Database;
use crate::model::{InvoiceDraft, LineItem, ReceiptDraft, ShippedItem, WaybillDraft};
use crate::numbering::NumberFormat;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub db: Arc<Database>,
    pub counters: Arc<LocalCounterStore>,
    pub assets_dir: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let assets_dir = temp_dir.path().join("assets");
        let db = Arc::new(Database::open_in_memory().expect("failed to open database"));
        let counters = Arc::new(LocalCounterStore::new(db.clone(), NumberFormat::default()));
        Self {
            _temp_dir: temp_dir,
            db,
            counters,
            assets_dir,
        }
    }
}

pub fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
}

pub fn invoice_draft(customer: &str) -> InvoiceDraft {
    InvoiceDraft {
        customer_name: customer.to_string(),
        issue_date: date(),
        classification: "Goods".to_string(),
        items: vec![LineItem {
            description: "Item A".into(),
            quantity: Decimal::new(2, 0),
            unit_price: Decimal::new(50, 0),
        }],
    }
}

pub fn receipt_draft(received_from: &str) -> ReceiptDraft {
    ReceiptDraft {
        received_from: received_from.to_string(),
        issue_date: date(),
        amount: Decimal::new(12050, 2),
        description: "Deposit".into(),
        payment_method: "Cash".into(),
        approved_by: "Kofi".into(),
    }
}

pub fn waybill_draft(destination: &str) -> WaybillDraft {
    WaybillDraft {
        customer_name: "Acme Ltd".into(),
        issue_date: date(),
        destination: destination.to_string(),
        driver_name: "Yaw".into(),
        receiver_name: "Efua".into(),
        items: vec![ShippedItem {
            description: "Cement".into(),
            quantity: Decimal::new(40, 0),
        }],
    }
}
