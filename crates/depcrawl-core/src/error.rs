//! Error types for depcrawl-core

use std::path::PathBuf;

use depcrawl_state::StateError;
use thiserror::Error;

/// Startup and seed-acquisition errors. These end the process.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Seed list file could not be read
    #[error("failed to read seed list {path}: {source}")]
    SeedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package index returned something unusable
    #[error("package index error: {0}")]
    SeedIndex(String),

    /// HTTP error talking to the package index
    #[error("HTTP error: {0}")]
    Http(String),

    /// Result store could not be opened
    #[error("result store unavailable: {0}")]
    Store(#[from] StateError),

    /// Invalid crawl configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        CrawlError::Http(err.to_string())
    }
}

/// Import metadata could not be resolved for an identifier.
///
/// Never fatal: the build stage records an empty `BuildInfo` and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot import {identifier}: {reason}")]
pub struct MetadataError {
    pub identifier: String,
    pub reason: String,
}

impl MetadataError {
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for depcrawl-core startup operations
pub type Result<T> = std::result::Result<T, CrawlError>;
