//! depcrawl core library
//!
//! The self-feeding crawl pipeline: a deduplicating [`Frontier`], a fetch
//! stage and a build worker pool connected by channels, and the
//! [`Orchestrator`] that routes records into a
//! [`ResultSink`](depcrawl_state::ResultSink) and expands the frontier from
//! their imports.
//!
//! Concrete toolchain steps live in `depcrawl-toolchain`; this crate only
//! sees them through the [`Step`], [`Check`] and [`MetadataProbe`] traits.

pub mod build;
pub mod config;
pub mod error;
pub mod fakes;
pub mod fetch;
pub mod frontier;
pub mod known;
pub mod orchestrator;
pub mod pool;
pub mod seeds;
pub mod steps;
pub mod telemetry;
pub mod vcs;

pub use build::BuildPipeline;
pub use config::{
    CrawlConfig, ExpansionMode, RetryPolicy, DEFAULT_BUILD_WORKERS, DEFAULT_FETCH_WORKERS,
};
pub use error::{CrawlError, MetadataError, Result};
pub use fetch::{FetchResult, FetchStage};
pub use frontier::Frontier;
pub use known::KnownSet;
pub use orchestrator::{CrawlReport, CrawlState, Orchestrator, PersistRetry};
pub use seeds::{parse_seed_list, IndexClient, SeedSource, DEFAULT_INDEX_URL};
pub use steps::{Check, MetadataProbe, SourceTree, Step, StepSet};
pub use telemetry::init_tracing;
pub use vcs::{Bazaar, Git, Mercurial, VcsBackend, VcsSet};

pub use depcrawl_state::{
    BuildInfo, CheckOutcome, Identifier, RepositoryInfo, ResultRecord, ResultSink, Revision,
    StepOutcome,
};
