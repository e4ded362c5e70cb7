//! Subprocess execution for toolchain steps.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use depcrawl_core::SourceTree;
use depcrawl_state::Identifier;
use tokio::process::Command;
use tracing::debug;

use crate::stage::StepConfig;

/// Result of one step execution.
#[derive(Debug, Clone)]
pub struct StepRun {
    /// Step name.
    pub step_name: String,

    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout followed by captured stderr.
    pub output: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the exit code is one the step accepts.
    pub success: bool,
}

/// Runs step commands against one source tree.
///
/// Every command sees `GOPATH` set to the tree root and module mode disabled,
/// so `go` resolves identifiers inside the tree.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    tree: SourceTree,
    env: Vec<(String, String)>,
}

impl CommandRunner {
    pub fn new(tree: SourceTree) -> Self {
        let env = vec![
            ("GOPATH".to_string(), tree.root().to_string_lossy().into_owned()),
            ("GO111MODULE".to_string(), "off".to_string()),
        ];
        Self { tree, env }
    }

    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    /// Execute `config` for `id` and capture its output.
    ///
    /// Errors only when the command cannot be started or times out; a
    /// non-zero exit is reported through [`StepRun::success`].
    pub async fn execute(&self, config: &StepConfig, id: &Identifier) -> anyhow::Result<StepRun> {
        let start = Instant::now();

        let command = config.render(id, &self.tree);
        let Some((exe, args)) = command.split_first() else {
            anyhow::bail!("Step {} has empty command", config.name);
        };

        let mut cmd = Command::new(exe);
        cmd.args(args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.working_dir() {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {} for {}", exe, id))?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Step {} timed out after {} seconds",
                    config.name,
                    config.timeout_secs
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(step = %config.name, identifier = %id, exit_code, duration_ms, "step finished");

        Ok(StepRun {
            step_name: config.name.clone(),
            exit_code,
            output: combined,
            duration_ms,
            success: config.accepts(exit_code),
        })
    }

    /// Run in the tree root once it exists.
    fn working_dir(&self) -> Option<PathBuf> {
        let root = self.tree.root();
        root.is_dir().then(|| root.to_path_buf())
    }
}
