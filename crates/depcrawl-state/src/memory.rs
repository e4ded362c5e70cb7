//! In-memory result store.
//!
//! Used when no durable store is configured. Records are kept in a
//! `BTreeMap<identifier, record>` and can be dumped as indented JSON at
//! shutdown.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::{Identifier, ResultRecord};
use crate::sink::{ResultSink, ResultStore, StorageResult};

/// In-memory store keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: Mutex<BTreeMap<String, ResultRecord>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ResultRecord>> {
        // each insert is a single map operation, so a poisoned map is still consistent
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored identifiers in key order.
    pub fn identifiers(&self) -> Vec<Identifier> {
        let records = self.lock();
        records.keys().map(|k| Identifier::new(k.as_str())).collect()
    }

    /// Indented JSON object of every record keyed by identifier.
    pub fn dump(&self) -> StorageResult<String> {
        let records = self.lock();
        Ok(serde_json::to_string_pretty(&*records)?)
    }
}

#[async_trait]
impl ResultSink for MemoryResultStore {
    async fn insert(&self, record: &ResultRecord) -> StorageResult<()> {
        let mut records = self.lock();
        records.insert(record.identifier.as_str().to_string(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(&self, identifier: &Identifier) -> StorageResult<ResultRecord> {
        let records = self.lock();
        records
            .get(identifier.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    async fn find_by_remote_url(&self, url: &str) -> StorageResult<Vec<ResultRecord>> {
        let records = self.lock();
        Ok(records
            .values()
            .filter(|r| r.repository.remote_url == url)
            .cloned()
            .collect())
    }

    async fn list(&self) -> StorageResult<Vec<ResultRecord>> {
        let records = self.lock();
        Ok(records.values().cloned().collect())
    }
}
