//! Result records produced by the build stage.
//!
//! A [`ResultRecord`] is the unit that crosses the persistence boundary. It is
//! owned by the build worker that produced it until it is handed to the
//! orchestrator, which passes it on to a [`crate::ResultSink`].

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of a crawlable unit of code (an import path).
///
/// Compared by exact string equality; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(path: impl Into<String>) -> Self {
        Identifier(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Identifier(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Identifier(s)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A single revision as reported by a version-control client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub id: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
}

impl Revision {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// First `n` characters of the revision id.
    pub fn short_id(&self, n: usize) -> &str {
        match self.id.char_indices().nth(n) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// Version-control facts about the checkout an identifier lives in.
///
/// Derived, not authoritative: every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Backend name ("git", "hg", "bzr"), empty when none matched
    pub vcs_type: String,
    pub revision: Revision,
    /// Repository root, relative to the source tree when possible
    pub root: String,
    pub remote_url: String,
}

impl RepositoryInfo {
    pub fn is_empty(&self) -> bool {
        self.vcs_type.is_empty() && self.revision.is_empty()
    }
}

/// Import metadata extracted once per successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Direct imports; these seed the next expansion round
    pub imports: BTreeSet<Identifier>,
    /// Whether the unit links foreign (C) code
    pub uses_foreign_code: bool,
    pub source_files: Vec<String>,
}

/// Outcome of a pass/fail pipeline step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub succeeded: bool,
    pub log: String,
}

impl StepOutcome {
    pub fn passed(log: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            log: log.into(),
        }
    }

    pub fn failed(log: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            log: log.into(),
        }
    }
}

/// Outcome of a counting check (format differences, lint findings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub defects: u32,
    pub log: String,
}

impl CheckOutcome {
    pub fn new(defects: u32, log: impl Into<String>) -> Self {
        Self {
            defects,
            log: log.into(),
        }
    }
}

/// Persisted outcome of one identifier's full pipeline run.
///
/// Steps that never ran are `None` (compile after a metadata failure, format,
/// test and lints after a compile failure). `fetch` carries the download log
/// of the attempt that produced this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub identifier: Identifier,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub repository: RepositoryInfo,
    #[serde(default)]
    pub build_info: BuildInfo,
    #[serde(default)]
    pub fetch: Option<StepOutcome>,
    #[serde(default)]
    pub compile: Option<StepOutcome>,
    #[serde(default)]
    pub format: Option<CheckOutcome>,
    #[serde(default)]
    pub test: Option<StepOutcome>,
    /// Lint findings keyed by check name
    #[serde(default)]
    pub lints: BTreeMap<String, CheckOutcome>,
}

impl ResultRecord {
    /// Empty record stamped with the current time.
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            recorded_at: Utc::now(),
            repository: RepositoryInfo::default(),
            build_info: BuildInfo::default(),
            fetch: None,
            compile: None,
            format: None,
            test: None,
            lints: BTreeMap::new(),
        }
    }

    pub fn compiled(&self) -> bool {
        self.compile.as_ref().is_some_and(|s| s.succeeded)
    }

    pub fn tests_passed(&self) -> bool {
        self.test.as_ref().is_some_and(|s| s.succeeded)
    }

    /// Defect count of a named lint check, zero when it did not run.
    pub fn lint_defects(&self, check: &str) -> u32 {
        self.lints.get(check).map(|c| c.defects).unwrap_or(0)
    }

    pub fn imports(&self) -> impl Iterator<Item = &Identifier> {
        self.build_info.imports.iter()
    }
}
