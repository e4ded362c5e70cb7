//! Persistence trait definitions for depcrawl
//!
//! - `ResultSink`: the one operation the crawler needs (`insert`)
//! - `ResultStore`: a sink that can also answer reporting queries
//!
//! All traits are async and backend-agnostic. Two backends are provided:
//! [`crate::MemoryResultStore`] and [`crate::SurrealResultStore`].

use async_trait::async_trait;

use crate::error::StorageError;
use crate::records::{Identifier, ResultRecord};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Insert-only destination for result records.
///
/// Guarantees:
/// - Records are keyed by identifier; inserting the same identifier again
///   replaces the previous record (upsert).
/// - Concurrent single-record inserts are safe.
/// - An `Err` means the record was not stored.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn insert(&self, record: &ResultRecord) -> StorageResult<()>;
}

/// A sink that can be queried for reporting.
#[async_trait]
pub trait ResultStore: ResultSink {
    /// Record for one identifier. Returns `StorageError::NotFound` if absent.
    async fn get(&self, identifier: &Identifier) -> StorageResult<ResultRecord>;

    /// All records whose repository has the given remote URL, ordered by identifier.
    async fn find_by_remote_url(&self, url: &str) -> StorageResult<Vec<ResultRecord>>;

    /// Every stored record, ordered by identifier.
    async fn list(&self) -> StorageResult<Vec<ResultRecord>>;
}
