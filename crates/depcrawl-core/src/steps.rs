//! Pipeline step seams.
//!
//! Every step is a trait object taking an identifier and the source tree it
//! was fetched into. Production steps shell out to a toolchain (see the
//! `depcrawl-toolchain` crate); tests plug in fakes from [`crate::fakes`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use depcrawl_state::{BuildInfo, CheckOutcome, Identifier, StepOutcome};

use crate::error::MetadataError;

/// Directory tree that fetched sources are placed into.
///
/// Identifier `a/b/c` lives at `<root>/src/a/b/c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: PathBuf,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of every package directory.
    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn package_dir(&self, id: &Identifier) -> PathBuf {
        let mut dir = self.src_dir();
        for segment in id.as_str().split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir
    }
}

/// A pass/fail step: fetch, compile, test.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, id: &Identifier, tree: &SourceTree) -> StepOutcome;
}

/// A counting check: format differences, lint findings.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, id: &Identifier, tree: &SourceTree) -> CheckOutcome;
}

/// Resolves the direct imports and file list of a fetched identifier.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, id: &Identifier, tree: &SourceTree) -> Result<BuildInfo, MetadataError>;
}

/// The full set of steps one crawl runs per identifier.
#[derive(Clone)]
pub struct StepSet {
    pub fetch: Arc<dyn Step>,
    pub metadata: Arc<dyn MetadataProbe>,
    pub compile: Arc<dyn Step>,
    pub format: Arc<dyn Check>,
    pub test: Arc<dyn Step>,
    /// Independent lint checks, each recorded under its own name
    pub lints: Vec<Arc<dyn Check>>,
}

impl std::fmt::Debug for StepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepSet")
            .field("fetch", &self.fetch.name())
            .field("compile", &self.compile.name())
            .field("format", &self.format.name())
            .field("test", &self.test.name())
            .field(
                "lints",
                &self.lints.iter().map(|l| l.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_dir_nests_path_segments() {
        let tree = SourceTree::new("/work");
        let dir = tree.package_dir(&"example.org/lib/sub".into());
        assert_eq!(dir, PathBuf::from("/work/src/example.org/lib/sub"));
    }

    #[test]
    fn package_dir_ignores_empty_segments() {
        let tree = SourceTree::new("/work");
        let dir = tree.package_dir(&"/a//b/".into());
        assert_eq!(dir, PathBuf::from("/work/src/a/b"));
    }
}
