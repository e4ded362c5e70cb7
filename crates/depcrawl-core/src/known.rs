//! Identifiers that are never crawled: the toolchain's own packages.
//!
//! Built once at startup by walking the toolchain source tree and shared
//! read-only with the orchestrator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Immutable set of identifiers excluded from frontier expansion.
#[derive(Debug, Clone, Default)]
pub struct KnownSet {
    inner: Arc<HashSet<String>>,
}

impl KnownSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every directory under `root`, as a `/`-separated path relative to it.
    ///
    /// Hidden directories and `testdata` trees are skipped. A missing or
    /// unreadable root yields an empty set.
    pub fn scan(root: &Path) -> Self {
        let mut names = HashSet::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_excluded(e));

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.insert(name);
        }

        debug!(root = %root.display(), count = names.len(), "scanned known packages");
        Self {
            inner: Arc::new(names),
        }
    }

    /// Scan the package sources of a toolchain installed at `goroot`.
    ///
    /// Older layouts keep packages under `src/pkg`, newer ones directly in `src`.
    pub fn from_toolchain_root(goroot: &Path) -> Self {
        let legacy: PathBuf = goroot.join("src").join("pkg");
        let root = if legacy.is_dir() {
            legacy
        } else {
            goroot.join("src")
        };
        let set = Self::scan(&root);
        info!(root = %root.display(), packages = set.len(), "loaded standard package set");
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            inner: Arc::new(iter.into_iter().map(Into::into).collect()),
        }
    }
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "testdata"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_collects_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        for d in ["fmt", "net/http", "net/http/pprof", "net/http/testdata/x", ".git/objects"] {
            fs::create_dir_all(dir.path().join(d)).unwrap();
        }
        fs::write(dir.path().join("fmt/print.go"), "package fmt").unwrap();

        let set = KnownSet::scan(dir.path());
        assert!(set.contains("fmt"));
        assert!(set.contains("net"));
        assert!(set.contains("net/http"));
        assert!(set.contains("net/http/pprof"));
        assert!(!set.contains("net/http/testdata"));
        assert!(!set.contains(".git"));
        assert!(!set.contains("fmt/print.go"));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let set = KnownSet::scan(Path::new("/definitely/not/here"));
        assert!(set.is_empty());
    }

    #[test]
    fn toolchain_root_prefers_legacy_layout() {
        let goroot = tempfile::tempdir().unwrap();
        fs::create_dir_all(goroot.path().join("src/pkg/strings")).unwrap();
        fs::create_dir_all(goroot.path().join("src/cmd/go")).unwrap();

        let set = KnownSet::from_toolchain_root(goroot.path());
        assert!(set.contains("strings"));
        assert!(!set.contains("cmd/go"));
    }

    #[test]
    fn toolchain_root_falls_back_to_src() {
        let goroot = tempfile::tempdir().unwrap();
        fs::create_dir_all(goroot.path().join("src/strings")).unwrap();

        let set = KnownSet::from_toolchain_root(goroot.path());
        assert!(set.contains("strings"));
    }

    #[test]
    fn collects_from_iterator() {
        let set: KnownSet = ["fmt", "os"].into_iter().collect();
        assert!(set.contains("os"));
        assert!(!set.contains("io"));
    }
}
