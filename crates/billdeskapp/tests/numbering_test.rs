use billdeskapp::counter::local::LocalCounterStore;
use billdeskapp::counter::CounterStore;
use billdeskapp::db::Database;
use billdeskapp::config::BillingConfig;
use billdeskapp::init::initialize_with;
use billdeskapp::model::DocumentType;
use billdeskapp::numbering::NumberFormat;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_fresh_install_numbers_invoices_in_order() {
    let dir = TempDir::new().unwrap();
    let ctx = initialize_with(dir.path().to_path_buf(), BillingConfig::default()).unwrap();

    let numbers: Vec<String> = (0..3)
        .map(|_| {
            ctx.api
                .reserve_document_number(DocumentType::Invoice)
                .unwrap()
        })
        .collect();
    assert_eq!(numbers, vec!["INV-001", "INV-002", "INV-003"]);

    let counts = ctx.api.get_document_counts().unwrap();
    assert_eq!(counts.invoice, 3);
    assert_eq!(counts.receipt, 0);
    assert_eq!(counts.waybill, 0);
}

#[test]
fn test_peek_then_reserve_agree() {
    let dir = TempDir::new().unwrap();
    let ctx = initialize_with(dir.path().to_path_buf(), BillingConfig::default()).unwrap();

    for doc_type in DocumentType::ALL {
        let peeked = ctx.api.peek_document_number(doc_type).unwrap();
        assert_eq!(ctx.api.peek_document_number(doc_type).unwrap(), peeked);
        assert_eq!(ctx.api.reserve_document_number(doc_type).unwrap(), peeked);
    }
}

#[test]
fn test_processes_sharing_a_database_never_share_numbers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("shared.sqlite3");

    // each handle stands in for a separate process with its own connection
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let db = Arc::new(Database::open(&path).unwrap());
                let store = LocalCounterStore::new(db, NumberFormat::default());
                (0..15)
                    .map(|_| store.reserve(DocumentType::Receipt).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for number in handle.join().unwrap() {
            assert!(seen.insert(number.clone()), "duplicate {}", number);
        }
    }
    assert_eq!(seen.len(), 60);
    assert!(seen.contains("REC-001"));
    assert!(seen.contains("REC-060"));
}
