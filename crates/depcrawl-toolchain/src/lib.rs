//! depcrawl toolchain - Go toolchain steps for the crawler
//!
//! Provides the concrete steps the build pipeline runs:
//! - `go get` to fetch, `go build` to compile, `go test`
//! - `gofmt -l`, `go vet` and `errcheck` as counting checks
//! - `go list -json` for import metadata

pub mod command;
pub mod probe;
pub mod runner;
pub mod stage;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use depcrawl_core::{SourceTree, StepSet};
use tokio::process::Command;

pub use command::{count_defects, CommandCheck, CommandStep};
pub use probe::{parse_go_list, GoListProbe};
pub use runner::{CommandRunner, StepRun};
pub use stage::{BuiltinStep, StepConfig};

/// Builds the [`StepSet`] for a Go source tree.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    runner: CommandRunner,
    timeout_secs: u64,
}

impl GoToolchain {
    pub fn new(tree: SourceTree) -> Self {
        Self {
            runner: CommandRunner::new(tree),
            timeout_secs: 0,
        }
    }

    /// Per-step timeout; 0 disables it.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn step(&self, builtin: BuiltinStep) -> CommandStep {
        CommandStep::new(
            StepConfig::from_builtin(builtin, self.timeout_secs),
            self.runner.clone(),
        )
    }

    fn check(&self, builtin: BuiltinStep) -> CommandCheck {
        CommandCheck::new(
            StepConfig::from_builtin(builtin, self.timeout_secs),
            self.runner.clone(),
        )
    }

    pub fn step_set(&self) -> StepSet {
        StepSet {
            fetch: Arc::new(self.step(BuiltinStep::Fetch)),
            metadata: Arc::new(GoListProbe::new(self.runner.clone(), self.timeout_secs)),
            compile: Arc::new(self.step(BuiltinStep::Compile)),
            format: Arc::new(self.check(BuiltinStep::Format)),
            test: Arc::new(self.step(BuiltinStep::Test)),
            lints: vec![
                Arc::new(self.check(BuiltinStep::Vet)),
                Arc::new(self.check(BuiltinStep::Errcheck)),
            ],
        }
    }
}

/// Installation root of the `go` tool on `PATH`.
pub async fn goroot() -> anyhow::Result<PathBuf> {
    let output = Command::new("go")
        .args(["env", "GOROOT"])
        .output()
        .await
        .context("Failed to run `go env GOROOT`")?;

    if !output.status.success() {
        anyhow::bail!(
            "`go env GOROOT` failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if root.is_empty() {
        anyhow::bail!("`go env GOROOT` printed nothing");
    }
    Ok(PathBuf::from(root))
}
