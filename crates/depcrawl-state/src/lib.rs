//! depcrawl-state: result records and persistence sinks
//!
//! This crate owns everything that crosses the persistence boundary of the
//! crawler: the [`ResultRecord`] document, the [`ResultSink`] /
//! [`ResultStore`] traits, and the two backends that satisfy them.
//!
//! ## Key Components
//!
//! - `ResultRecord`: one identifier's full pipeline outcome
//! - `MemoryResultStore`: in-process map with an indented dump
//! - `SurrealResultStore`: durable SurrealDB store (upsert by identifier)
//! - `ResultBackend`: opens whichever backend the configuration selects

mod backend;
mod config;
mod error;
pub mod fakes;
mod memory;
mod migrations;
pub mod records;
mod schema;
pub mod sink;
mod surreal_store;

pub use backend::ResultBackend;
pub use config::{StoreConfig, SurrealConfig, DEFAULT_DATABASE, DEFAULT_NAMESPACE};
pub use error::{StateError, StorageError};
pub use memory::MemoryResultStore;
pub use records::{
    BuildInfo, CheckOutcome, Identifier, RepositoryInfo, ResultRecord, Revision, StepOutcome,
};
pub use schema::PackageRow;
pub use sink::{ResultSink, ResultStore, StorageResult};
pub use surreal_store::SurrealResultStore;
