//! Scripted steps and VCS backends for exercising the pipeline without a
//! toolchain (testing only).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use depcrawl_state::{BuildInfo, CheckOutcome, Identifier, Revision, StepOutcome};

use crate::error::MetadataError;
use crate::steps::{Check, MetadataProbe, SourceTree, Step, StepSet};
use crate::vcs::VcsBackend;

/// A pass/fail step that succeeds unless told otherwise for an identifier.
#[derive(Debug)]
pub struct ScriptedStep {
    name: String,
    failures: Mutex<HashMap<String, String>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedStep {
    pub fn passing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_for(self, id: &str, log: &str) -> Self {
        self.fail(id, log);
        self
    }

    pub fn fail(&self, id: &str, log: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(id.to_string(), log.to_string());
    }

    pub fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, id: &Identifier, _tree: &SourceTree) -> StepOutcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failures.lock().unwrap().get(id.as_str()).cloned();
        match failure {
            Some(log) => StepOutcome::failed(log),
            None => StepOutcome::passed(format!("{} {}: ok", self.name, id)),
        }
    }
}

/// A counting check with per-identifier defect counts (zero by default).
#[derive(Debug)]
pub struct ScriptedCheck {
    name: String,
    defects: Mutex<HashMap<String, u32>>,
}

impl ScriptedCheck {
    pub fn clean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            defects: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_defects(&self, id: &str, defects: u32) {
        self.defects
            .lock()
            .unwrap()
            .insert(id.to_string(), defects);
    }
}

#[async_trait]
impl Check for ScriptedCheck {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, id: &Identifier, _tree: &SourceTree) -> CheckOutcome {
        let defects = self
            .defects
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or(0);
        let log = (0..defects)
            .map(|n| format!("{id}: finding {n}\n"))
            .collect::<String>();
        CheckOutcome::new(defects, log)
    }
}

/// Import metadata from a fixed dependency graph.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    imports: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_imports(&self, id: &str, imports: &[&str]) {
        self.imports.lock().unwrap().insert(
            id.to_string(),
            imports.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl MetadataProbe for ScriptedProbe {
    async fn probe(&self, id: &Identifier, _tree: &SourceTree) -> Result<BuildInfo, MetadataError> {
        if self.failing.lock().unwrap().contains(id.as_str()) {
            return Err(MetadataError::new(id.as_str(), "no buildable source files"));
        }
        let imports = self
            .imports
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .unwrap_or_default();
        let file = id.as_str().rsplit('/').next().unwrap_or("main");
        Ok(BuildInfo {
            imports: imports.into_iter().map(Identifier::new).collect(),
            uses_foreign_code: false,
            source_files: vec![format!("{file}.go")],
        })
    }
}

/// Full scripted toolchain: every identifier fetches, builds and tests
/// cleanly unless configured otherwise.
#[derive(Debug, Clone)]
pub struct FakeToolchain {
    pub fetch: Arc<ScriptedStep>,
    pub metadata: Arc<ScriptedProbe>,
    pub compile: Arc<ScriptedStep>,
    pub format: Arc<ScriptedCheck>,
    pub test: Arc<ScriptedStep>,
    pub vet: Arc<ScriptedCheck>,
    pub errcheck: Arc<ScriptedCheck>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self {
            fetch: Arc::new(ScriptedStep::passing("fetch")),
            metadata: Arc::new(ScriptedProbe::new()),
            compile: Arc::new(ScriptedStep::passing("compile")),
            format: Arc::new(ScriptedCheck::clean("format")),
            test: Arc::new(ScriptedStep::passing("test")),
            vet: Arc::new(ScriptedCheck::clean("vet")),
            errcheck: Arc::new(ScriptedCheck::clean("errcheck")),
        }
    }

    /// Replace the fetch step, e.g. with a delayed one.
    pub fn with_fetch(mut self, fetch: ScriptedStep) -> Self {
        self.fetch = Arc::new(fetch);
        self
    }

    pub fn with_imports(self, id: &str, imports: &[&str]) -> Self {
        self.metadata.set_imports(id, imports);
        self
    }

    pub fn failing_fetch(self, id: &str) -> Self {
        self.fetch.fail(id, "package not found");
        self
    }

    pub fn failing_metadata(self, id: &str) -> Self {
        self.metadata.fail(id);
        self
    }

    pub fn failing_compile(self, id: &str) -> Self {
        self.compile.fail(id, "undefined: missingSymbol");
        self
    }

    pub fn failing_test(self, id: &str) -> Self {
        self.test.fail(id, "--- FAIL: TestSomething");
        self
    }

    pub fn with_lint_defects(self, lint: &str, id: &str, defects: u32) -> Self {
        match lint {
            "errcheck" => self.errcheck.set_defects(id, defects),
            _ => self.vet.set_defects(id, defects),
        }
        self
    }

    pub fn compile_calls(&self) -> usize {
        self.compile.total_calls()
    }

    pub fn fetch_calls(&self, id: &str) -> usize {
        self.fetch.calls(id)
    }

    pub fn step_set(&self) -> StepSet {
        StepSet {
            fetch: self.fetch.clone(),
            metadata: self.metadata.clone(),
            compile: self.compile.clone(),
            format: self.format.clone(),
            test: self.test.clone(),
            lints: vec![self.vet.clone(), self.errcheck.clone()],
        }
    }
}

/// A VCS backend answering with fixed values for every directory.
#[derive(Debug)]
pub struct StaticVcs {
    name: String,
    revision: Revision,
    root: String,
    url: String,
    revision_calls: AtomicUsize,
}

impl StaticVcs {
    pub fn new(name: &str, revision_id: &str, root: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            revision: Revision {
                id: revision_id.to_string(),
                author: "Fake Author <fake@example.org>".to_string(),
                date: None,
            },
            root: root.to_string(),
            url: url.to_string(),
            revision_calls: AtomicUsize::new(0),
        }
    }

    /// A backend that never recognises a checkout.
    pub fn empty(name: &str) -> Self {
        Self::new(name, "", "", "")
    }

    pub fn revision_calls(&self) -> usize {
        self.revision_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VcsBackend for StaticVcs {
    fn name(&self) -> &str {
        &self.name
    }

    async fn revision(&self, _dir: &Path) -> Revision {
        self.revision_calls.fetch_add(1, Ordering::SeqCst);
        self.revision.clone()
    }

    async fn root(&self, _dir: &Path) -> String {
        self.root.clone()
    }

    async fn url(&self, _dir: &Path) -> String {
        self.url.clone()
    }
}
