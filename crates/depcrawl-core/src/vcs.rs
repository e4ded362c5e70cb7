//! Version-control metadata for fetched source trees.
//!
//! Each backend answers three textual queries about a directory by running
//! its client. Any client failure yields empty values, never an error: a
//! record with blank repository fields is still a valid record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depcrawl_state::{Identifier, RepositoryInfo, Revision};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::steps::SourceTree;

const ISO_DATE: &str = "%Y-%m-%d %H:%M:%S %z";
const BZR_DATE: &str = "%a %Y-%m-%d %H:%M:%S %z";

/// One version-control system.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn revision(&self, dir: &Path) -> Revision;

    async fn root(&self, dir: &Path) -> String;

    async fn url(&self, dir: &Path) -> String;
}

/// Run `program args..` in `dir` and return trimmed stdout, or `""` on any failure.
pub async fn vcs_output(dir: &Path, program: &str, args: &[&str]) -> String {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        Ok(out) => {
            trace!(program, status = ?out.status.code(), "vcs query failed");
            String::new()
        }
        Err(e) => {
            trace!(program, error = %e, "vcs client not runnable");
            String::new()
        }
    }
}

fn parse_date(s: &str, format: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s.trim(), format)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Parse the three-line `id / date / author` form emitted by git and hg.
///
/// Anything other than exactly three lines yields an empty revision.
pub fn parse_revision(output: &str) -> Revision {
    let lines: Vec<&str> = output.split('\n').collect();
    match lines.as_slice() {
        [id, date, author] => Revision {
            id: id.trim().to_string(),
            author: author.trim().to_string(),
            date: parse_date(date, ISO_DATE),
        },
        _ => Revision::default(),
    }
}

/// Parse `bzr log --log-format=long` output for the latest revision.
pub fn parse_bzr_revision(output: &str) -> Revision {
    let mut rev = Revision::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(' ') else {
            continue;
        };
        match key {
            "revno:" => rev.id = value.trim().to_string(),
            "committer:" => rev.author = value.trim().to_string(),
            "timestamp:" => rev.date = parse_date(value, BZR_DATE),
            _ => {}
        }
    }
    rev
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

#[async_trait]
impl VcsBackend for Git {
    fn name(&self) -> &str {
        "git"
    }

    async fn revision(&self, dir: &Path) -> Revision {
        let out = vcs_output(
            dir,
            "git",
            &["log", "--pretty=format:%h%n%ai%n%an <%ae>", "-1"],
        )
        .await;
        parse_revision(&out)
    }

    async fn root(&self, dir: &Path) -> String {
        vcs_output(dir, "git", &["rev-parse", "--show-toplevel"]).await
    }

    async fn url(&self, dir: &Path) -> String {
        vcs_output(dir, "git", &["config", "--get", "remote.origin.url"]).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mercurial;

#[async_trait]
impl VcsBackend for Mercurial {
    fn name(&self) -> &str {
        "hg"
    }

    async fn revision(&self, dir: &Path) -> Revision {
        let out = vcs_output(
            dir,
            "hg",
            &[
                "log",
                "-r",
                ".",
                "--template",
                "{node|short}\n{date|isodatesec}\n{author}",
            ],
        )
        .await;
        parse_revision(&out)
    }

    async fn root(&self, dir: &Path) -> String {
        vcs_output(dir, "hg", &["root"]).await
    }

    async fn url(&self, dir: &Path) -> String {
        vcs_output(dir, "hg", &["paths", "default"]).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bazaar;

#[async_trait]
impl VcsBackend for Bazaar {
    fn name(&self) -> &str {
        "bzr"
    }

    async fn revision(&self, dir: &Path) -> Revision {
        // bzr has no template option; parse the long log format instead
        let out = vcs_output(dir, "bzr", &["log", "--limit=1", "--log-format=long"]).await;
        parse_bzr_revision(&out)
    }

    async fn root(&self, dir: &Path) -> String {
        vcs_output(dir, "bzr", &["root"]).await
    }

    async fn url(&self, _dir: &Path) -> String {
        String::new()
    }
}

/// Ordered backends plus identifier-prefix preselection.
#[derive(Clone)]
pub struct VcsSet {
    backends: Vec<Arc<dyn VcsBackend>>,
    prefixes: Vec<(String, String)>,
}

impl std::fmt::Debug for VcsSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsSet")
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

impl Default for VcsSet {
    /// git, hg, bzr with the well-known hosting prefixes preselected.
    fn default() -> Self {
        Self::new(vec![Arc::new(Git), Arc::new(Mercurial), Arc::new(Bazaar)])
            .with_prefix("github.com/", "git")
            .with_prefix("bitbucket.org/", "hg")
            .with_prefix("code.google.com/", "hg")
            .with_prefix("launchpad.net/", "bzr")
    }
}

impl VcsSet {
    pub fn new(backends: Vec<Arc<dyn VcsBackend>>) -> Self {
        Self {
            backends,
            prefixes: Vec::new(),
        }
    }

    /// Try `backend` first for identifiers starting with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>, backend: impl Into<String>) -> Self {
        self.prefixes.push((prefix.into(), backend.into()));
        self
    }

    /// Backends in the order they will be tried for `id`.
    pub fn order_for(&self, id: &Identifier) -> Vec<Arc<dyn VcsBackend>> {
        let preferred = self
            .prefixes
            .iter()
            .find(|(prefix, _)| id.as_str().starts_with(prefix.as_str()))
            .map(|(_, name)| name.as_str());

        let mut ordered = self.backends.clone();
        if let Some(name) = preferred {
            if let Some(pos) = ordered.iter().position(|b| b.name() == name) {
                let backend = ordered.remove(pos);
                ordered.insert(0, backend);
            }
        }
        ordered
    }

    /// Describe the checkout holding `id`. The first backend reporting a
    /// non-empty revision id wins; if none does, every field is empty.
    pub async fn probe(&self, id: &Identifier, tree: &SourceTree) -> RepositoryInfo {
        let dir = tree.package_dir(id);
        for backend in self.order_for(id) {
            let revision = backend.revision(&dir).await;
            if revision.is_empty() {
                continue;
            }
            let root = backend.root(&dir).await;
            let info = RepositoryInfo {
                vcs_type: backend.name().to_string(),
                revision,
                root: relative_root(&root, &tree.src_dir()),
                remote_url: backend.url(&dir).await,
            };
            debug!(identifier = %id, vcs = %info.vcs_type, rev = %info.revision.id, "vcs metadata");
            return info;
        }
        debug!(identifier = %id, "no vcs metadata");
        RepositoryInfo::default()
    }
}

/// `root` relative to `src`, or `root` unchanged when it lies elsewhere.
fn relative_root(root: &str, src: &Path) -> String {
    if root.is_empty() {
        return String::new();
    }
    let root_path = PathBuf::from(root);
    let canonical_src = std::fs::canonicalize(src).ok();
    let candidates = std::iter::once(src.to_path_buf()).chain(canonical_src);
    for base in candidates {
        if let Ok(rel) = root_path.strip_prefix(&base) {
            return rel.to_string_lossy().into_owned();
        }
    }
    root.to_string()
}
