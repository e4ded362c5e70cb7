//! Opens the configured result backend.

use std::sync::Arc;

use tracing::info;

use crate::config::StoreConfig;
use crate::error::StateError;
use crate::memory::MemoryResultStore;
use crate::sink::{ResultSink, ResultStore, StorageResult};
use crate::surreal_store::SurrealResultStore;

/// The backend chosen at startup from [`StoreConfig`].
#[derive(Clone)]
pub enum ResultBackend {
    Memory(Arc<MemoryResultStore>),
    Surreal(Arc<SurrealResultStore>),
}

impl ResultBackend {
    /// Open the backend. Connection failures are fatal to the caller.
    pub async fn open(config: &StoreConfig) -> Result<Self, StateError> {
        match config {
            StoreConfig::Memory => {
                info!("Using in-memory result store");
                Ok(ResultBackend::Memory(Arc::new(MemoryResultStore::new())))
            }
            StoreConfig::Surreal(surreal) => {
                let store = SurrealResultStore::connect(surreal).await?;
                Ok(ResultBackend::Surreal(Arc::new(store)))
            }
        }
    }

    /// Insert-only handle for the crawler.
    pub fn sink(&self) -> Arc<dyn ResultSink> {
        match self {
            ResultBackend::Memory(m) => m.clone(),
            ResultBackend::Surreal(s) => s.clone(),
        }
    }

    /// Query handle for reporting.
    pub fn store(&self) -> Arc<dyn ResultStore> {
        match self {
            ResultBackend::Memory(m) => m.clone(),
            ResultBackend::Surreal(s) => s.clone(),
        }
    }

    /// Indented dump of every record; only the in-memory backend has one.
    pub fn dump(&self) -> Option<StorageResult<String>> {
        match self {
            ResultBackend::Memory(m) => Some(m.dump()),
            ResultBackend::Surreal(_) => None,
        }
    }
}
