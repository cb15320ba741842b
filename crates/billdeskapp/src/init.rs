//! # Start-up
//!
//! [`initialize`] turns "where does my data live" into a ready [`BillingApi`].
//! Front ends call it once and keep the returned [`BillingContext`].
//!
//! ## Data Directory
//!
//! Everything billdesk stores lives under a single data directory:
//!
//! ```text
//! <data_dir>/
//!   billdesk.toml       optional settings (see crate::config)
//!   billdesk.sqlite3    documents and the local counter row
//!   assets/             files bundled into project archives
//! ```
//!
//! The directory is resolved in this order:
//!
//! 1. The explicit `data_override` argument (the CLI's `--data` flag).
//! 2. The `BILLDESK_DATA` environment variable. Tests use it to isolate state.
//! 3. The OS data directory from the `directories` crate.
//!
//! ## Sequence
//!
//! 1. Load [`BillingConfig`] from the environment and `billdesk.toml`.
//!    [`initialize_with`] skips this step and takes a ready config instead.
//! 2. Open the database (creating the file and schema if needed).
//! 3. Select the counter store. A broken remote setup degrades to the local
//!    store with a warning; it never stops start-up.
//! 4. Build the API over the selected store.

use crate::api::{ApiSettings, BillingApi};
use crate::config::BillingConfig;
use crate::counter::selector::select_counter_store;
use crate::counter::BackendKind;
use crate::db::Database;
use crate::error::{BillingError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;

pub const DATA_DIR_ENV: &str = "BILLDESK_DATA";

pub struct BillingContext {
    pub api: BillingApi,
    pub config: BillingConfig,
    pub backend: BackendKind,
    pub data_dir: PathBuf,
}

/// Resolve the data directory without touching it.
pub fn resolve_data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "billdesk", "billdesk")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| BillingError::Config("could not determine a data directory".to_string()))
}

/// Build the billdesk context for `data_override` (or the default data directory).
pub fn initialize(data_override: Option<PathBuf>) -> Result<BillingContext> {
    let data_dir = resolve_data_dir(data_override)?;
    let config = BillingConfig::load(&data_dir)?;
    initialize_with(data_dir, config)
}

/// Build the context for `data_dir` with an already loaded `config`.
pub fn initialize_with(data_dir: PathBuf, config: BillingConfig) -> Result<BillingContext> {
    std::fs::create_dir_all(&data_dir)?;

    let db = Arc::new(Database::open(&config.database_path(&data_dir))?);
    let selected = select_counter_store(&config, db.clone());

    tracing::debug!(
        data_dir = %data_dir.display(),
        backend = %selected.kind,
        "billdesk initialized"
    );

    let api = BillingApi::new(
        db,
        selected.store,
        ApiSettings {
            assets_dir: config.assets_dir(&data_dir),
            schema_version: config.schema_version,
            app_version: config.app_version(),
            levies: config.levies(),
        },
    );

    Ok(BillingContext {
        api,
        config,
        backend: selected.kind,
        data_dir,
    })
}
