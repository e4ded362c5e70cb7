//! Crawl configuration.

use std::path::PathBuf;
use std::time::Duration;

use depcrawl_state::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};
use crate::seeds::SeedSource;

/// Default number of concurrent build workers
pub const DEFAULT_BUILD_WORKERS: usize = 8;

/// Default number of concurrent fetch workers
pub const DEFAULT_FETCH_WORKERS: usize = 1;

/// Whether persisted records feed their imports back into the frontier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
    /// Crawl the transitive import graph
    #[default]
    Follow,
    /// Process the seeds and stop
    SeedsOnly,
}

/// How often, and how patiently, a record is retried after its insert fails.
///
/// Every retry re-runs the whole pipeline for the identifier. Between
/// attempts the identifier waits `base_delay * 2^(failures - 1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per identifier; `None` retries forever
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Retry forever with the default backoff.
    pub fn unlimited() -> Self {
        Self {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Up to `max_attempts` attempts, re-queued without delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether attempt number `attempt` (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Wait before re-queueing after `failures` failed attempts.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Everything one crawl run needs to know.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Root of the source tree fetched packages are placed into
    pub source_root: PathBuf,
    pub build_workers: usize,
    pub fetch_workers: usize,
    pub mode: ExpansionMode,
    pub retry: RetryPolicy,
    pub store: StoreConfig,
    pub seeds: Option<SeedSource>,
    /// Per-step timeout in seconds; 0 disables it
    pub step_timeout_secs: u64,
    /// Toolchain root whose packages are never crawled
    pub known_root: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            source_root: std::env::temp_dir().join("depcrawl").join("gopath"),
            build_workers: DEFAULT_BUILD_WORKERS,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            mode: ExpansionMode::default(),
            retry: RetryPolicy::default(),
            store: StoreConfig::default(),
            seeds: None,
            step_timeout_secs: 0,
            known_root: None,
        }
    }
}

impl CrawlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = root.into();
        self
    }

    pub fn with_build_workers(mut self, n: usize) -> Self {
        self.build_workers = n;
        self
    }

    pub fn with_fetch_workers(mut self, n: usize) -> Self {
        self.fetch_workers = n;
        self
    }

    pub fn with_mode(mut self, mode: ExpansionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_seeds(mut self, seeds: SeedSource) -> Self {
        self.seeds = Some(seeds);
        self
    }

    pub fn with_step_timeout_secs(mut self, secs: u64) -> Self {
        self.step_timeout_secs = secs;
        self
    }

    pub fn with_known_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.known_root = Some(root.into());
        self
    }

    /// Per-step timeout, if one is configured.
    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    pub fn validate(&self) -> Result<()> {
        if self.build_workers == 0 {
            return Err(CrawlError::Config("build_workers must be at least 1".into()));
        }
        if self.fetch_workers == 0 {
            return Err(CrawlError::Config("fetch_workers must be at least 1".into()));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(CrawlError::Config(
                "max persist attempts must be at least 1".into(),
            ));
        }
        if self.source_root.as_os_str().is_empty() {
            return Err(CrawlError::Config("source root is empty".into()));
        }
        Ok(())
    }
}
