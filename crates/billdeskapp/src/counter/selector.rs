use super::local::LocalCounterStore;
use super::remote::{RemoteCounterStore, RetryConfig};
use super::remote_backend::RemoteBackend;
use super::{BackendKind, CounterStore};
use crate::config::{BillingConfig, RemoteConfig};
use crate::db::Database;
use crate::error::Result;
use crate::numbering::NumberFormat;
use std::sync::Arc;

/// The counter store chosen at start-up.
#[derive(Clone)]
pub struct SelectedStore {
    pub kind: BackendKind,
    pub store: Arc<dyn CounterStore>,
}

/// Pick the counter store for this process.
///
/// The remote store is used only when the client is compiled in, the remote
/// settings are complete and the counter document can be read. Otherwise the
/// local store is returned; this never fails because of the remote side.
pub fn select_counter_store(config: &BillingConfig, db: Arc<Database>) -> SelectedStore {
    #[cfg(feature = "remote")]
    {
        select_with(config, db, true, super::firestore::FirestoreBackend::connect)
    }
    #[cfg(not(feature = "remote"))]
    {
        select_with(config, db, false, |_: &RemoteConfig| -> Result<super::mem_remote::MemRemote> {
            Err(crate::error::BillingError::Config(
                "remote client not compiled in".to_string(),
            ))
        })
    }
}

/// Selection with the remote connector injected.
pub fn select_with<B, F>(
    config: &BillingConfig,
    db: Arc<Database>,
    client_available: bool,
    connect: F,
) -> SelectedStore
where
    B: RemoteBackend + 'static,
    F: FnOnce(&RemoteConfig) -> Result<B>,
{
    let format = NumberFormat::new(config.counter_pad);
    let local = || SelectedStore {
        kind: BackendKind::Local,
        store: Arc::new(LocalCounterStore::new(db.clone(), format)),
    };

    if !client_available {
        tracing::info!("remote counter client not available; using local counter store");
        return local();
    }
    if let Some(reason) = config.remote.missing_setting() {
        tracing::info!(reason, "using local counter store");
        return local();
    }

    let retry = RetryConfig::default().with_max_retries(config.remote.max_retries);
    match connect(&config.remote) {
        Ok(backend) => {
            tracing::info!(document = %backend.describe(), "using remote counter store");
            SelectedStore {
                kind: BackendKind::Remote,
                store: Arc::new(RemoteCounterStore::new(backend, format, retry)),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "remote counter store unavailable, falling back to local");
            local()
        }
    }
}
