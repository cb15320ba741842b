//! # API Facade
//!
//! [`BillingApi`] is the single entry point for every billdesk operation,
//! whatever the front end (the `billdesk` CLI, an HTTP layer, tests).
//!
//! It owns no logic of its own: it holds the counter store chosen at start-up
//! and the components that depend on it, and dispatches to them.
//!
//! ## Dependency Injection
//!
//! The counter store is passed in, never looked up. Production code gets it
//! from [`crate::counter::selector::select_counter_store`] via
//! [`crate::init::initialize`]; tests build a `BillingApi` over an in-memory
//! database with either store.
//!
//! ## Operations
//!
//! | Method | Mutates |
//! |--------|---------|
//! | `peek_document_number` | no |
//! | `reserve_document_number` | counter +1 |
//! | `get_document_counts` | no |
//! | `export_project_archive` | no |
//! | `import_project_archive` | everything |
//! | `create_*` / `update_*` / `delete_*` | documents (create also reserves) |

use crate::calculator::LevyRate;
use crate::counter::{BackendKind, CounterStore};
use crate::db::Database;
use crate::documents::DocumentStore;
use crate::error::{ImportError, Result};
use crate::model::{
    DocumentCounts, DocumentType, Invoice, InvoiceDraft, Receipt, ReceiptDraft, Waybill,
    WaybillDraft,
};
use crate::project::{ImportSummary, ProjectArchive};
use std::path::PathBuf;
use std::sync::Arc;

pub struct BillingApi {
    counters: Arc<dyn CounterStore>,
    documents: DocumentStore,
    archive: ProjectArchive,
}

/// Everything [`BillingApi::new`] needs besides the counter store.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub assets_dir: PathBuf,
    pub schema_version: u32,
    pub app_version: String,
    pub levies: Vec<LevyRate>,
}

impl BillingApi {
    pub fn new(db: Arc<Database>, counters: Arc<dyn CounterStore>, settings: ApiSettings) -> Self {
        let documents = DocumentStore::new(db.clone(), counters.clone(), settings.levies);
        let archive = ProjectArchive::new(
            db,
            counters.clone(),
            settings.assets_dir,
            settings.schema_version,
            settings.app_version,
        );
        Self {
            counters,
            documents,
            archive,
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.counters.kind()
    }

    pub fn peek_document_number(&self, doc_type: DocumentType) -> Result<String> {
        self.counters.peek(doc_type)
    }

    pub fn reserve_document_number(&self, doc_type: DocumentType) -> Result<String> {
        self.counters.reserve(doc_type)
    }

    pub fn get_document_counts(&self) -> Result<DocumentCounts> {
        self.counters.counts()
    }

    pub fn export_project_archive(&self) -> Result<Vec<u8>> {
        self.archive.export()
    }

    pub fn import_project_archive(&self, bytes: &[u8]) -> std::result::Result<ImportSummary, ImportError> {
        self.archive.import(bytes)
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn create_invoice(&self, draft: InvoiceDraft) -> Result<Invoice> {
        self.documents.create_invoice(draft)
    }

    pub fn update_invoice(&self, id: i64, draft: InvoiceDraft) -> Result<Invoice> {
        self.documents.update_invoice(id, draft)
    }

    pub fn delete_invoice(&self, id: i64) -> Result<()> {
        self.documents.delete_invoice(id)
    }

    pub fn create_receipt(&self, draft: ReceiptDraft) -> Result<Receipt> {
        self.documents.create_receipt(draft)
    }

    pub fn update_receipt(&self, id: i64, draft: ReceiptDraft) -> Result<Receipt> {
        self.documents.update_receipt(id, draft)
    }

    pub fn delete_receipt(&self, id: i64) -> Result<()> {
        self.documents.delete_receipt(id)
    }

    pub fn create_waybill(&self, draft: WaybillDraft) -> Result<Waybill> {
        self.documents.create_waybill(draft)
    }

    pub fn update_waybill(&self, id: i64, draft: WaybillDraft) -> Result<Waybill> {
        self.documents.update_waybill(id, draft)
    }

    pub fn delete_waybill(&self, id: i64) -> Result<()> {
        self.documents.delete_waybill(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::mem_remote::MemRemote;
    use crate::counter::remote::{RemoteCounterStore, RetryConfig};
    use crate::numbering::NumberFormat;
    use crate::test_utils::{receipt_draft, waybill_draft, TestEnv};

    fn settings(env: &TestEnv) -> ApiSettings {
        ApiSettings {
            assets_dir: env.assets_dir.clone(),
            schema_version: 1,
            app_version: "0.3.0".into(),
            levies: Vec::new(),
        }
    }

    #[test]
    fn test_api_over_local_store() {
        let env = TestEnv::new();
        let api = BillingApi::new(env.db.clone(), env.counters.clone(), settings(&env));

        assert_eq!(api.backend(), BackendKind::Local);
        assert_eq!(api.peek_document_number(DocumentType::Receipt).unwrap(), "REC-001");
        let receipt = api.create_receipt(receipt_draft("Ama")).unwrap();
        assert_eq!(receipt.document_number.as_deref(), Some("REC-001"));
        assert_eq!(api.get_document_counts().unwrap().receipt, 1);
    }

    #[test]
    fn test_api_over_remote_store() {
        let env = TestEnv::new();
        let counters = Arc::new(RemoteCounterStore::new(
            MemRemote::new(),
            NumberFormat::default(),
            RetryConfig::default(),
        ));
        let api = BillingApi::new(env.db.clone(), counters.clone(), settings(&env));

        assert_eq!(api.backend(), BackendKind::Remote);
        assert_eq!(api.reserve_document_number(DocumentType::Waybill).unwrap(), "WAY-001");
        let waybill = api.create_waybill(waybill_draft("Tema")).unwrap();
        assert_eq!(waybill.document_number.as_deref(), Some("WAY-002"));
        assert_eq!(
            counters.backend().snapshot().unwrap().get("waybill_counter"),
            Some(&3)
        );
    }

    #[test]
    fn test_archive_round_trip_through_api() {
        let env = TestEnv::new();
        let api = BillingApi::new(env.db.clone(), env.counters.clone(), settings(&env));
        api.create_receipt(receipt_draft("Ama")).unwrap();
        let bytes = api.export_project_archive().unwrap();

        api.create_receipt(receipt_draft("Kojo")).unwrap();
        let summary = api.import_project_archive(&bytes).unwrap();
        assert_eq!(summary.receipts, 1);
        assert_eq!(api.peek_document_number(DocumentType::Receipt).unwrap(), "REC-002");
        assert_eq!(api.documents().list_receipts().unwrap().len(), 1);
    }
}
