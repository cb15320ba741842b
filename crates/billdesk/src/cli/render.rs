//! Output for each command, as plain text or a single JSON object.

use billdeskapp::counter::BackendKind;
use billdeskapp::model::{DocumentCounts, DocumentType};
use billdeskapp::project::ImportSummary;
use serde_json::json;
use std::path::Path;

pub fn number(doc_type: DocumentType, number: &str, as_json: bool) -> String {
    if as_json {
        json!({ "doc_type": doc_type, "number": number }).to_string()
    } else {
        number.to_string()
    }
}

pub fn counts(counts: &DocumentCounts, as_json: bool) -> String {
    if as_json {
        return json!(counts).to_string();
    }
    DocumentType::ALL
        .iter()
        .map(|t| format!("{:<8} {}", t.as_str(), counts.get(*t)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn exported(path: &Path, size: usize, as_json: bool) -> String {
    if as_json {
        json!({ "path": path.display().to_string(), "bytes": size }).to_string()
    } else {
        format!("Exported {} bytes to {}", size, path.display())
    }
}

pub fn imported(summary: &ImportSummary, as_json: bool) -> String {
    if as_json {
        return json!(summary).to_string();
    }
    format!(
        "Imported {} invoices, {} receipts, {} waybills, {} assets",
        summary.invoices, summary.receipts, summary.waybills, summary.assets
    )
}

pub fn backend(kind: BackendKind, data_dir: &Path, as_json: bool) -> String {
    if as_json {
        json!({ "backend": kind, "data_dir": data_dir.display().to_string() }).to_string()
    } else {
        format!("{} ({})", kind, data_dir.display())
    }
}
