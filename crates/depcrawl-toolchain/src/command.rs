//! Step and check adapters over [`CommandRunner`].

use async_trait::async_trait;
use depcrawl_core::{Check, SourceTree, Step};
use depcrawl_state::{CheckOutcome, Identifier, StepOutcome};
use tracing::warn;

use crate::runner::CommandRunner;
use crate::stage::StepConfig;

/// A pass/fail step backed by a command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    config: StepConfig,
    runner: CommandRunner,
}

impl CommandStep {
    pub fn new(config: StepConfig, runner: CommandRunner) -> Self {
        Self { config, runner }
    }
}

#[async_trait]
impl Step for CommandStep {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self, id: &Identifier, _tree: &SourceTree) -> StepOutcome {
        match self.runner.execute(&self.config, id).await {
            Ok(run) => StepOutcome {
                succeeded: run.success,
                log: run.output,
            },
            Err(e) => {
                warn!(step = %self.config.name, identifier = %id, error = %e, "step did not run");
                StepOutcome::failed(format!("{e:#}"))
            }
        }
    }
}

/// A counting check backed by a command: one defect per non-empty output line.
#[derive(Debug, Clone)]
pub struct CommandCheck {
    config: StepConfig,
    runner: CommandRunner,
}

impl CommandCheck {
    pub fn new(config: StepConfig, runner: CommandRunner) -> Self {
        Self { config, runner }
    }
}

/// Number of non-empty lines in `output`.
pub fn count_defects(output: &str) -> u32 {
    let lines = output.lines().filter(|l| !l.trim().is_empty()).count();
    u32::try_from(lines).unwrap_or(u32::MAX)
}

#[async_trait]
impl Check for CommandCheck {
    fn name(&self) -> &str {
        &self.config.name
    }

    /// A check that exits outside its accepted codes reports zero defects
    /// and keeps its output as the log.
    async fn run(&self, id: &Identifier, _tree: &SourceTree) -> CheckOutcome {
        match self.runner.execute(&self.config, id).await {
            Ok(run) if run.success => CheckOutcome::new(count_defects(&run.output), run.output),
            Ok(run) => {
                warn!(
                    check = %self.config.name,
                    identifier = %id,
                    exit_code = run.exit_code,
                    "check failed"
                );
                CheckOutcome::new(0, run.output)
            }
            Err(e) => {
                warn!(check = %self.config.name, identifier = %id, error = %e, "check did not run");
                CheckOutcome::new(0, format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SourceTree {
        SourceTree::new("/nonexistent/gopath")
    }

    fn sh(name: &str, script: &str) -> StepConfig {
        StepConfig::custom(
            name.to_string(),
            vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            30,
        )
    }

    #[test]
    fn defects_are_non_empty_lines() {
        assert_eq!(count_defects(""), 0);
        assert_eq!(count_defects("a.go\nb.go\n"), 2);
        assert_eq!(count_defects("a.go\n\n  \nb.go"), 2);
    }

    #[tokio::test]
    async fn step_reports_success_and_log() {
        let step = CommandStep::new(sh("compile", "echo built"), CommandRunner::new(tree()));
        let outcome = step.run(&"x".into(), &tree()).await;
        assert!(outcome.succeeded);
        assert_eq!(outcome.log, "built\n");
    }

    #[tokio::test]
    async fn step_failure_is_data() {
        let config = sh("test", "echo FAIL >&2; exit 2");
        let step = CommandStep::new(config, CommandRunner::new(tree()));
        let outcome = step.run(&"x".into(), &tree()).await;
        assert!(!outcome.succeeded);
        assert!(outcome.log.contains("FAIL"));
    }

    #[tokio::test]
    async fn unstartable_step_fails_with_reason() {
        let config =
            StepConfig::custom("fetch".to_string(), vec!["no-such-tool-xyz".to_string()], 0);
        let step = CommandStep::new(config, CommandRunner::new(tree()));
        let outcome = step.run(&"x".into(), &tree()).await;
        assert!(!outcome.succeeded);
        assert!(outcome.log.contains("no-such-tool-xyz"));
    }

    #[tokio::test]
    async fn check_counts_findings_on_accepted_exit() {
        let config = sh("vet", "printf 'a.go:1: x\\nb.go:2: y\\n'; exit 1")
            .with_accepted_exit_codes(vec![0, 1]);
        let check = CommandCheck::new(config, CommandRunner::new(tree()));
        let outcome = check.run(&"x".into(), &tree()).await;
        assert_eq!(outcome.defects, 2);
    }

    #[tokio::test]
    async fn failed_check_reports_zero_defects() {
        let config = sh("errcheck", "echo crashed; exit 3");
        let check = CommandCheck::new(config, CommandRunner::new(tree()));
        let outcome = check.run(&"x".into(), &tree()).await;
        assert_eq!(outcome.defects, 0);
        assert_eq!(outcome.log, "crashed\n");
    }
}
