//! Import metadata via `go list -json`.

use async_trait::async_trait;
use depcrawl_core::{MetadataError, MetadataProbe, SourceTree};
use depcrawl_state::{BuildInfo, Identifier};
use serde::Deserialize;

use crate::runner::CommandRunner;
use crate::stage::{StepConfig, ID_PLACEHOLDER};

/// The subset of `go list -json` output the crawler records.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GoPackage {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    go_files: Vec<String>,
    #[serde(default)]
    cgo_files: Vec<String>,
    #[serde(default)]
    error: Option<GoPackageError>,
}

#[derive(Debug, Deserialize)]
struct GoPackageError {
    #[serde(rename = "Err")]
    err: String,
}

/// Import that enables cgo. It names no fetchable package; cgo use is
/// recorded as `uses_foreign_code` instead.
const CGO_PSEUDO_IMPORT: &str = "C";

/// Parse one package object printed by `go list -json`.
pub fn parse_go_list(id: &Identifier, json: &str) -> Result<BuildInfo, MetadataError> {
    let package: GoPackage = serde_json::from_str(json)
        .map_err(|e| MetadataError::new(id.as_str(), format!("unreadable go list output: {e}")))?;

    if let Some(error) = package.error {
        return Err(MetadataError::new(id.as_str(), error.err));
    }

    Ok(BuildInfo {
        imports: package
            .imports
            .into_iter()
            .filter(|import| import != CGO_PSEUDO_IMPORT)
            .map(Identifier::new)
            .collect(),
        uses_foreign_code: !package.cgo_files.is_empty(),
        source_files: package.go_files,
    })
}

/// Resolves imports with the `go` tool inside the source tree.
#[derive(Debug, Clone)]
pub struct GoListProbe {
    config: StepConfig,
    runner: CommandRunner,
}

impl GoListProbe {
    pub fn new(runner: CommandRunner, timeout_secs: u64) -> Self {
        let config = StepConfig::custom(
            "metadata".to_string(),
            vec![
                "go".to_string(),
                "list".to_string(),
                "-e".to_string(),
                "-json".to_string(),
                ID_PLACEHOLDER.to_string(),
            ],
            timeout_secs,
        );
        Self { config, runner }
    }

    /// Use a different command, which must print one `go list -json` object.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.config.command = command;
        self
    }
}

#[async_trait]
impl MetadataProbe for GoListProbe {
    async fn probe(&self, id: &Identifier, _tree: &SourceTree) -> Result<BuildInfo, MetadataError> {
        let run = self
            .runner
            .execute(&self.config, id)
            .await
            .map_err(|e| MetadataError::new(id.as_str(), format!("{e:#}")))?;

        if !run.success {
            let reason = run.output.trim();
            return Err(MetadataError::new(
                id.as_str(),
                if reason.is_empty() { "go list failed" } else { reason },
            ));
        }
        parse_go_list(id, &run.output)
    }
}
