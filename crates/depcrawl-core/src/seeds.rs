//! Seed identifier sources: a line-oriented file or a package index.

use std::path::{Path, PathBuf};

use depcrawl_state::Identifier;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::{CrawlError, Result};

/// Package index queried when no other URL is configured
pub const DEFAULT_INDEX_URL: &str = "http://api.godoc.org/packages";

/// Where the initial identifiers come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    /// One identifier per line; blank lines and `#` comments are skipped
    File(PathBuf),
    /// JSON index endpoint returning `{"results":[{"path":"..."}]}`
    Index { url: String },
}

impl SeedSource {
    /// Resolve a named source (`index`, or its legacy alias `godoc`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "index" | "godoc" => Some(SeedSource::Index {
                url: DEFAULT_INDEX_URL.to_string(),
            }),
            _ => None,
        }
    }

    /// Fetch the seed identifiers in source order.
    pub async fn load(&self) -> Result<Vec<Identifier>> {
        match self {
            SeedSource::File(path) => read_seed_file(path).await,
            SeedSource::Index { url } => IndexClient::new(url.clone())?.packages().await,
        }
    }
}

/// Parse a seed list, keeping order and dropping blanks and comments.
pub fn parse_seed_list(text: &str) -> Vec<Identifier> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Identifier::from)
        .collect()
}

pub async fn read_seed_file(path: &Path) -> Result<Vec<Identifier>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CrawlError::SeedFile {
            path: path.to_path_buf(),
            source,
        })?;
    let seeds = parse_seed_list(&text);
    info!(path = %path.display(), count = seeds.len(), "read seed list");
    Ok(seeds)
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    results: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    path: String,
}

/// Decode an index response body into identifiers.
pub fn parse_index_response(body: &str) -> Result<Vec<Identifier>> {
    let response: IndexResponse = serde_json::from_str(body)
        .map_err(|e| CrawlError::SeedIndex(format!("malformed index response: {e}")))?;
    Ok(response
        .results
        .into_iter()
        .filter(|entry| !entry.path.is_empty())
        .map(|entry| Identifier::new(entry.path))
        .collect())
}

/// HTTP client for a package index.
#[derive(Debug, Clone)]
pub struct IndexClient {
    url: String,
    http_client: reqwest::Client,
}

impl IndexClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("depcrawl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn packages(&self) -> Result<Vec<Identifier>> {
        let response = self.http_client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::SeedIndex(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }
        let body = response.text().await?;
        let seeds = parse_index_response(&body)?;
        debug!(count = seeds.len(), "package index listing");
        Ok(seeds)
    }
}
