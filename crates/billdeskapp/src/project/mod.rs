//! # Project Archives
//!
//! A project archive is a zip snapshot of the whole application state:
//!
//! ```text
//! metadata.json   { "schema_version": 1, "exported_at": "...", "app_version": "..." }
//! project.json    { "counters": {...}, "invoices": [...], "receipts": [...], "waybills": [...] }
//! assets/...      every file under the assets directory, verbatim
//! ```
//!
//! ## Import is all or nothing
//!
//! 1. **Validate** (no side effects): open the zip, parse both JSON members,
//!    check the schema version, build the full document set, collect the
//!    asset members that are safe to extract.
//! 2. **Stage**: extract assets into a sibling staging directory.
//! 3. **Apply**, in one SQLite write transaction: replace all documents,
//!    restore the counters, swap the staged assets in. If the transaction
//!    fails the swap is undone and the database is untouched.
//!
//! Only step 3 errors surface as [`ImportError::Apply`]; everything else is
//! reported before any state changes.
//!
//! Counter values are restored exactly as archived. If the archive holds
//! documents numbered at or above its own counter, the next reservation will
//! collide with an existing number; this is logged as a warning.

pub mod assets;
pub mod payload;

use crate::counter::CounterStore;
use crate::db::Database;
use crate::documents;
use crate::error::{ImportError, Result};
use crate::model::{CounterState, DocumentSet, DocumentType};
use crate::numbering::NumberFormat;
use assets::{StagedAssets, ASSETS_PREFIX};
use chrono::Utc;
use payload::{
    check_schema_version, parse_project, ArchiveMetadata, Fallbacks, ProjectPayload,
    METADATA_MEMBER, PROJECT_MEMBER,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Counts of what an import restored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub invoices: usize,
    pub receipts: usize,
    pub waybills: usize,
    pub assets: usize,
}

pub struct ProjectArchive {
    db: Arc<Database>,
    counters: Arc<dyn CounterStore>,
    assets_dir: PathBuf,
    schema_version: u32,
    app_version: String,
}

impl ProjectArchive {
    pub fn new(
        db: Arc<Database>,
        counters: Arc<dyn CounterStore>,
        assets_dir: PathBuf,
        schema_version: u32,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            db,
            counters,
            assets_dir,
            schema_version,
            app_version: app_version.into(),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Documents are read before counters. A number is always reserved
    /// before its document is inserted, so every exported document sits
    /// below the exported counter even with creates running alongside.
    pub fn export(&self) -> Result<Vec<u8>> {
        let documents = self.db.read(documents::load_all)?;
        let counters = self.counters.state()?;

        let metadata = ArchiveMetadata {
            schema_version: self.schema_version,
            exported_at: Utc::now().to_rfc3339(),
            app_version: self.app_version.clone(),
        };
        let project = ProjectPayload {
            counters: &counters,
            invoices: &documents.invoices,
            receipts: &documents.receipts,
            waybills: &documents.waybills,
        };

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(METADATA_MEMBER, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&metadata)?)?;
        zip.start_file(PROJECT_MEMBER, options)?;
        zip.write_all(&serde_json::to_vec_pretty(&project)?)?;

        let files = assets::collect_files(&self.assets_dir)?;
        for (name, path) in &files {
            zip.start_file(format!("{}{}", ASSETS_PREFIX, name), options)?;
            zip.write_all(&fs::read(path)?)?;
        }

        let bytes = zip.finish()?.into_inner();
        tracing::info!(
            invoices = documents.invoices.len(),
            receipts = documents.receipts.len(),
            waybills = documents.waybills.len(),
            assets = files.len(),
            size = bytes.len(),
            "project exported"
        );
        Ok(bytes)
    }

    pub fn import(&self, bytes: &[u8]) -> std::result::Result<ImportSummary, ImportError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(ImportError::InvalidArchive)?;

        let metadata = read_json(&mut archive, METADATA_MEMBER)?;
        check_schema_version(&metadata, self.schema_version)?;
        let project = parse_project(read_json(&mut archive, PROJECT_MEMBER)?, Fallbacks::current())?;

        // keyed by target so members that normalize to the same file count once;
        // the last one in the archive wins
        let mut members: BTreeMap<PathBuf, String> = BTreeMap::new();
        for name in archive.file_names() {
            match assets::member_target(name) {
                Some(target) => {
                    if let Some(previous) = members.insert(target, name.to_string()) {
                        tracing::debug!(member = name, previous = %previous, "duplicate asset member");
                    }
                }
                None if name.starts_with(ASSETS_PREFIX) && !name.ends_with('/') => {
                    tracing::warn!(member = name, "skipping unsafe asset path");
                }
                None => {}
            }
        }

        let mut staged = StagedAssets::create(&self.assets_dir).map_err(ImportError::Staging)?;
        for (target, name) in &members {
            let mut file = archive.by_name(name).map_err(ImportError::InvalidArchive)?;
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|source| ImportError::Read {
                    member: name.clone(),
                    source,
                })?;
            staged
                .write(target, &mut content.as_slice())
                .map_err(ImportError::Staging)?;
        }
        let asset_count = staged.count();

        let swap = self
            .db
            .write(|tx| {
                documents::replace_all(tx, &project.documents)?;
                self.counters.restore_within(tx, &project.counters)?;
                Ok(staged.swap_into(&self.assets_dir)?)
            })
            .map_err(ImportError::Apply)?;
        swap.commit();

        warn_on_collisions(&project.documents, &project.counters);

        let summary = ImportSummary {
            invoices: project.documents.invoices.len(),
            receipts: project.documents.receipts.len(),
            waybills: project.documents.waybills.len(),
            assets: asset_count,
        };
        tracing::info!(?summary, "project imported");
        Ok(summary)
    }
}

fn read_json<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    member: &str,
) -> std::result::Result<Value, ImportError> {
    let mut file = archive.by_name(member).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ImportError::MissingMember(member.to_string()),
        other => ImportError::InvalidArchive(other),
    })?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|source| ImportError::Read {
            member: member.to_string(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| ImportError::InvalidJson {
        member: member.to_string(),
        source,
    })
}

/// Log every type whose documents already use the number the counter will hand out next.
fn warn_on_collisions(documents: &DocumentSet, counters: &CounterState) {
    let format = NumberFormat::default();
    for doc_type in DocumentType::ALL {
        let next = counters.get(doc_type);
        let highest = documents
            .numbers(doc_type)
            .into_iter()
            .filter_map(|n| format.parse(n))
            .filter(|(t, _)| *t == doc_type)
            .map(|(_, v)| v)
            .max();
        if let Some(highest) = highest {
            if highest >= next {
                tracing::warn!(
                    doc_type = %doc_type,
                    highest,
                    counter = next,
                    "imported documents use numbers at or above the imported counter"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::local::LocalCounterStore;
    use crate::counter::BackendKind;
    use crate::documents::DocumentStore;
    use crate::model::{DocumentCounts, InvoiceDraft, LineItem};
    use rusqlite::Transaction;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Arc<Database>,
        counters: Arc<LocalCounterStore>,
        archive: ProjectArchive,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let counters = Arc::new(LocalCounterStore::new(db.clone(), NumberFormat::default()));
        let archive = ProjectArchive::new(
            db.clone(),
            counters.clone(),
            dir.path().join("assets"),
            1,
            "0.3.0",
        );
        Fixture {
            _dir: dir,
            db,
            counters,
            archive,
        }
    }

    fn zip_of(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_export_layout() {
        let fx = fixture();
        fs::create_dir_all(fx.archive.assets_dir().join("logos")).unwrap();
        fs::write(fx.archive.assets_dir().join("logos").join("acme.png"), b"\x89PNG").unwrap();

        let bytes = fx.archive.export().unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert!(names.contains(&"metadata.json"));
        assert!(names.contains(&"project.json"));
        assert!(names.contains(&"assets/logos/acme.png"));

        let metadata = read_json(&mut zip, METADATA_MEMBER).unwrap();
        assert_eq!(metadata["schema_version"], 1);
        assert_eq!(metadata["app_version"], "0.3.0");

        let project = read_json(&mut zip, PROJECT_MEMBER).unwrap();
        assert_eq!(project["counters"]["invoice_counter"], 1);
        assert_eq!(project["invoices"], Value::Array(vec![]));
    }

    #[test]
    fn test_export_records_use_strings_for_money() {
        let fx = fixture();
        let store = DocumentStore::new(fx.db.clone(), fx.counters.clone(), Vec::new());
        store
            .create_invoice(InvoiceDraft {
                customer_name: "Acme".into(),
                issue_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                classification: String::new(),
                items: vec![LineItem {
                    description: "Bolt".into(),
                    quantity: Decimal::new(3, 0),
                    unit_price: Decimal::new(125, 2),
                }],
            })
            .unwrap();

        let bytes = fx.archive.export().unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let project = read_json(&mut zip, PROJECT_MEMBER).unwrap();
        let invoice = &project["invoices"][0];
        assert_eq!(invoice["document_number"], "INV-001");
        assert_eq!(invoice["issue_date"], "2024-01-31");
        assert_eq!(invoice["subtotal"], "3.75");
        assert!(invoice["created_at"].as_str().unwrap().contains('T'));
        assert_eq!(project["counters"]["invoice_counter"], 2);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let fx = fixture();
        assert!(matches!(
            fx.archive.import(b"not a zip"),
            Err(ImportError::InvalidArchive(_))
        ));
    }

    #[test]
    fn test_import_missing_member() {
        let fx = fixture();
        let bytes = zip_of(&[("metadata.json", br#"{"schema_version": 1}"#)]);
        match fx.archive.import(&bytes) {
            Err(ImportError::MissingMember(name)) => assert_eq!(name, "project.json"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_import_invalid_json() {
        let fx = fixture();
        let bytes = zip_of(&[
            ("metadata.json", br#"{"schema_version": 1}"#),
            ("project.json", b"{ nope"),
        ]);
        assert!(matches!(
            fx.archive.import(&bytes),
            Err(ImportError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_import_restores_counters_and_documents() {
        let fx = fixture();
        let bytes = zip_of(&[
            ("metadata.json", br#"{"schema_version": 1}"#),
            (
                "project.json",
                br#"{
                    "counters": {"invoice_counter": 5, "receipt_counter": 2},
                    "invoices": [{"id": 11, "document_number": "INV-004", "customer_name": "Acme", "subtotal": "10.00"}]
                }"#,
            ),
            ("assets/readme.txt", b"hello"),
        ]);
        let summary = fx.archive.import(&bytes).unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                invoices: 1,
                receipts: 0,
                waybills: 0,
                assets: 1
            }
        );

        assert_eq!(fx.counters.peek(DocumentType::Invoice).unwrap(), "INV-005");
        assert_eq!(fx.counters.peek(DocumentType::Receipt).unwrap(), "REC-002");
        assert_eq!(fx.counters.peek(DocumentType::Waybill).unwrap(), "WAY-001");

        let docs = fx.db.read(documents::load_all).unwrap();
        assert_eq!(docs.invoices[0].id, 11);
        assert_eq!(docs.invoices[0].subtotal, Decimal::new(1000, 2));
        assert_eq!(
            fs::read(fx.archive.assets_dir().join("readme.txt")).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_failed_apply_rolls_everything_back() {
        let fx = fixture();
        let store = DocumentStore::new(fx.db.clone(), fx.counters.clone(), Vec::new());
        store
            .create_invoice(InvoiceDraft {
                customer_name: "Keep me".into(),
                issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                classification: String::new(),
                items: Vec::new(),
            })
            .unwrap();
        fs::create_dir_all(fx.archive.assets_dir()).unwrap();
        fs::write(fx.archive.assets_dir().join("old.txt"), b"old").unwrap();

        // counter far beyond the storage range fails inside the transaction
        let project = format!(
            r#"{{"counters": {{"invoice_counter": {}}}, "invoices": [{{"id": 1}}]}}"#,
            u64::MAX
        );
        let bytes = zip_of(&[
            ("metadata.json", br#"{"schema_version": 1}"#),
            ("project.json", project.as_bytes()),
            ("assets/new.txt", b"new"),
        ]);
        assert!(matches!(
            fx.archive.import(&bytes),
            Err(ImportError::Apply(_))
        ));

        let docs = fx.db.read(documents::load_all).unwrap();
        assert_eq!(docs.invoices.len(), 1);
        assert_eq!(docs.invoices[0].customer_name, "Keep me");
        assert_eq!(fx.counters.peek(DocumentType::Invoice).unwrap(), "INV-002");
        assert!(fx.archive.assets_dir().join("old.txt").exists());
        assert!(!fx.archive.assets_dir().join("new.txt").exists());
    }

    fn draft(customer: &str) -> InvoiceDraft {
        InvoiceDraft {
            customer_name: customer.into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            classification: String::new(),
            items: Vec::new(),
        }
    }

    /// Local counters that create an invoice right after every `state` read,
    /// the way a concurrent writer could during export.
    struct CreateAfterRead {
        inner: Arc<LocalCounterStore>,
        documents: DocumentStore,
    }

    impl CounterStore for CreateAfterRead {
        fn peek(&self, doc_type: DocumentType) -> Result<String> {
            self.inner.peek(doc_type)
        }

        fn reserve(&self, doc_type: DocumentType) -> Result<String> {
            self.inner.reserve(doc_type)
        }

        fn counts(&self) -> Result<DocumentCounts> {
            self.inner.counts()
        }

        fn state(&self) -> Result<CounterState> {
            let state = self.inner.state()?;
            self.documents.create_invoice(draft("Concurrent"))?;
            Ok(state)
        }

        fn restore_within(&self, tx: &Transaction<'_>, state: &CounterState) -> Result<()> {
            self.inner.restore_within(tx, state)
        }

        fn kind(&self) -> BackendKind {
            self.inner.kind()
        }
    }

    #[test]
    fn test_export_counter_stays_above_documents_with_concurrent_creates() {
        let fx = fixture();
        let documents = DocumentStore::new(fx.db.clone(), fx.counters.clone(), Vec::new());
        documents.create_invoice(draft("First")).unwrap();

        let racing = Arc::new(CreateAfterRead {
            inner: fx.counters.clone(),
            documents: DocumentStore::new(fx.db.clone(), fx.counters.clone(), Vec::new()),
        });
        let archive = ProjectArchive::new(
            fx.db.clone(),
            racing,
            fx.archive.assets_dir().to_path_buf(),
            1,
            "0.3.0",
        );

        for _ in 0..3 {
            let bytes = archive.export().unwrap();
            let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
            let project = read_json(&mut zip, PROJECT_MEMBER).unwrap();

            let counter = project["counters"]["invoice_counter"].as_u64().unwrap();
            let highest = project["invoices"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|i| i["document_number"].as_str())
                .filter_map(|n| NumberFormat::default().parse(n))
                .map(|(_, v)| v)
                .max()
                .unwrap();
            assert!(highest < counter, "INV-{:03} exported with counter {}", highest, counter);
        }
    }

    #[test]
    fn test_duplicate_asset_targets_count_once() {
        let fx = fixture();
        let bytes = zip_of(&[
            ("metadata.json", br#"{"schema_version": 1}"#),
            ("project.json", b"{}"),
            ("assets/a.txt", b"first"),
            ("assets/./a.txt", b"second"),
        ]);
        let summary = fx.archive.import(&bytes).unwrap();
        assert_eq!(summary.assets, 1);
        assert_eq!(
            assets::collect_files(fx.archive.assets_dir()).unwrap().len(),
            1
        );
        assert_eq!(
            fs::read(fx.archive.assets_dir().join("a.txt")).unwrap(),
            b"second"
        );
    }

    #[test]
    fn test_staging_write_failure_is_staging_error() {
        let fx = fixture();
        fs::create_dir_all(fx.archive.assets_dir()).unwrap();
        fs::write(fx.archive.assets_dir().join("old.txt"), b"old").unwrap();

        // "x" is a file, so "x/y" cannot be written beneath it
        let bytes = zip_of(&[
            ("metadata.json", br#"{"schema_version": 1}"#),
            ("project.json", b"{}"),
            ("assets/x", b"file"),
            ("assets/x/y", b"nested"),
        ]);
        assert!(matches!(
            fx.archive.import(&bytes),
            Err(ImportError::Staging(_))
        ));

        assert_eq!(
            fs::read(fx.archive.assets_dir().join("old.txt")).unwrap(),
            b"old"
        );
        let parent = fx.archive.assets_dir().parent().unwrap();
        let names: Vec<String> = fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["assets"]);
    }
}
