//! Toolchain step definitions and configuration.

use depcrawl_core::SourceTree;
use depcrawl_state::Identifier;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the identifier being processed.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Placeholder replaced by the identifier's directory in the source tree.
pub const DIR_PLACEHOLDER: &str = "{dir}";

/// Builtin Go toolchain steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStep {
    /// go get -d -u {id}
    Fetch,

    /// go build {id}
    Compile,

    /// gofmt -l {dir}
    Format,

    /// go test {id}
    Test,

    /// go vet {id}
    Vet,

    /// errcheck {id}
    Errcheck,
}

impl BuiltinStep {
    /// Get the step name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStep::Fetch => "fetch",
            BuiltinStep::Compile => "compile",
            BuiltinStep::Format => "format",
            BuiltinStep::Test => "test",
            BuiltinStep::Vet => "vet",
            BuiltinStep::Errcheck => "errcheck",
        }
    }

    /// Command template; see [`ID_PLACEHOLDER`] and [`DIR_PLACEHOLDER`].
    pub fn command(&self) -> Vec<String> {
        let parts: &[&str] = match self {
            BuiltinStep::Fetch => &["go", "get", "-d", "-u", ID_PLACEHOLDER],
            BuiltinStep::Compile => &["go", "build", ID_PLACEHOLDER],
            BuiltinStep::Format => &["gofmt", "-l", DIR_PLACEHOLDER],
            BuiltinStep::Test => &["go", "test", ID_PLACEHOLDER],
            BuiltinStep::Vet => &["go", "vet", ID_PLACEHOLDER],
            BuiltinStep::Errcheck => &["errcheck", ID_PLACEHOLDER],
        };
        parts.iter().map(|s| s.to_string()).collect()
    }

    /// Exit codes that still count as a completed run.
    ///
    /// The lint tools exit 1 when they report findings.
    pub fn accepted_exit_codes(&self) -> Vec<i32> {
        match self {
            BuiltinStep::Vet | BuiltinStep::Errcheck => vec![0, 1],
            _ => vec![0],
        }
    }
}

/// Configuration for a toolchain step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Name the outcome is recorded under.
    pub name: String,

    /// Command template to execute (first element is executable).
    pub command: Vec<String>,

    /// Exit codes treated as success.
    pub accepted_exit_codes: Vec<i32>,

    /// Timeout in seconds; 0 waits indefinitely.
    pub timeout_secs: u64,
}

impl StepConfig {
    /// Create a step configuration from a builtin step.
    pub fn from_builtin(step: BuiltinStep, timeout_secs: u64) -> Self {
        Self {
            name: step.name().to_string(),
            command: step.command(),
            accepted_exit_codes: step.accepted_exit_codes(),
            timeout_secs,
        }
    }

    /// Create a custom step configuration.
    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            accepted_exit_codes: vec![0],
            timeout_secs,
        }
    }

    pub fn with_accepted_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.accepted_exit_codes = codes;
        self
    }

    pub fn accepts(&self, exit_code: i32) -> bool {
        self.accepted_exit_codes.contains(&exit_code)
    }

    /// The command with placeholders filled in for `id`.
    pub fn render(&self, id: &Identifier, tree: &SourceTree) -> Vec<String> {
        let dir = tree.package_dir(id);
        let dir = dir.to_string_lossy();
        self.command
            .iter()
            .map(|part| {
                part.replace(ID_PLACEHOLDER, id.as_str())
                    .replace(DIR_PLACEHOLDER, &dir)
            })
            .collect()
    }
}
