//! # Configuration
//!
//! Billdesk configuration is loaded with [`confique`] from two layers:
//!
//! 1. **Environment variables**: `FIREBASE_PROJECT_ID`, `FIREBASE_COUNTER_PAD`, etc.
//! 2. **Config file**: `<data dir>/billdesk.toml`. Optional.
//!
//! Anything not set falls back to the compiled defaults below.
//!
//! ## Available Settings
//!
//! | Key | Env | Default |
//! |-----|-----|---------|
//! | `counter_pad` | `FIREBASE_COUNTER_PAD` | `3` |
//! | `schema_version` | | `1` |
//! | `app_version` | | crate version |
//! | `database_path` | | `<data dir>/billdesk.sqlite3` |
//! | `assets_dir` | | `<data dir>/assets` |
//! | `levies` | | NHIL 2.5%, GETFUND 2.5%, COVID 1%, VAT 15% |
//! | `remote.project_id` | `FIREBASE_PROJECT_ID` | unset (local counters) |
//! | `remote.collection` | `FIREBASE_COUNTER_COLLECTION` | `documentCounters` |
//! | `remote.document` | `FIREBASE_COUNTER_DOCUMENT` | `global` |
//! | `remote.access_token` | `FIRESTORE_ACCESS_TOKEN` | unset |
//! | `remote.emulator_host` | `FIRESTORE_EMULATOR_HOST` | unset |
//! | `remote.timeout_secs` | | `10` |
//! | `remote.max_retries` | | `5` |

use crate::calculator::LevyRate;
use crate::error::{BillingError, Result};
use crate::numbering::DEFAULT_PAD_WIDTH;
use confique::Config;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "billdesk.toml";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_levies() -> Vec<LevyRate> {
    vec![
        LevyRate::new("NHIL", Decimal::new(25, 3)),
        LevyRate::new("GETFUND", Decimal::new(25, 3)),
        LevyRate::new("COVID", Decimal::new(1, 2)),
        LevyRate::new("VAT", Decimal::new(15, 2)),
    ]
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Digits in the numeric part of a document number.
    #[config(default = 3, env = "FIREBASE_COUNTER_PAD")]
    pub counter_pad: usize,

    /// Archive schema version written on export and required on import.
    #[config(default = 1)]
    pub schema_version: u32,

    /// Version string recorded in exported archives. Defaults to the crate version.
    pub app_version: Option<String>,

    pub database_path: Option<PathBuf>,

    pub assets_dir: Option<PathBuf>,

    /// Levies applied to every invoice subtotal, in order.
    pub levies: Option<Vec<LevyRate>>,

    #[config(nested)]
    pub remote: RemoteConfig,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            counter_pad: DEFAULT_PAD_WIDTH,
            schema_version: 1,
            app_version: None,
            database_path: None,
            assets_dir: None,
            levies: None,
            remote: RemoteConfig::default(),
        }
    }
}

impl BillingConfig {
    /// Load from the environment and `<data_dir>/billdesk.toml`. A missing file is fine.
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_file(&data_dir.join(CONFIG_FILE_NAME))
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        Self::builder()
            .env()
            .file(path)
            .load()
            .map_err(|e| BillingError::Config(e.to_string()))
    }

    /// Load `path` over the defaults, ignoring the environment.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::builder()
            .file(path)
            .load()
            .map_err(|e| BillingError::Config(e.to_string()))
    }

    pub fn app_version(&self) -> String {
        self.app_version
            .clone()
            .unwrap_or_else(|| APP_VERSION.to_string())
    }

    pub fn levies(&self) -> Vec<LevyRate> {
        self.levies.clone().unwrap_or_else(default_levies)
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir.join("billdesk.sqlite3"))
    }

    pub fn assets_dir(&self, data_dir: &Path) -> PathBuf {
        self.assets_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("assets"))
    }
}

/// Settings for the shared remote counter document.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    #[config(env = "FIREBASE_PROJECT_ID")]
    pub project_id: Option<String>,

    #[config(default = "documentCounters", env = "FIREBASE_COUNTER_COLLECTION")]
    pub collection: String,

    #[config(default = "global", env = "FIREBASE_COUNTER_DOCUMENT")]
    pub document: String,

    /// OAuth bearer token sent with every request.
    #[config(env = "FIRESTORE_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// `host:port` of a local emulator. Takes the place of credentials.
    #[config(env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    #[config(default = 10)]
    pub timeout_secs: u64,

    /// Retries after a conflicted transaction.
    #[config(default = 5)]
    pub max_retries: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            collection: "documentCounters".to_string(),
            document: "global".to_string(),
            access_token: None,
            emulator_host: None,
            timeout_secs: 10,
            max_retries: 5,
        }
    }
}

impl RemoteConfig {
    /// Why the remote store cannot be used, or `None` if it is fully configured.
    pub fn missing_setting(&self) -> Option<&'static str> {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !set(&self.project_id) {
            return Some("FIREBASE_PROJECT_ID not configured");
        }
        if !set(&self.access_token) && !set(&self.emulator_host) {
            return Some("no Firestore credentials or emulator host");
        }
        None
    }
}
