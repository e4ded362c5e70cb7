//! Fetch stage: download or refresh the sources for one identifier.

use std::sync::Arc;

use depcrawl_state::Identifier;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::pool::spawn_workers;
use crate::steps::{SourceTree, Step};

/// Outcome of one fetch attempt. `error` is `None` on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub identifier: Identifier,
    pub error: Option<String>,
    /// Captured output of the fetch step
    pub log: String,
}

impl FetchResult {
    pub fn ok(identifier: Identifier, log: impl Into<String>) -> Self {
        Self {
            identifier,
            error: None,
            log: log.into(),
        }
    }

    pub fn failed(
        identifier: Identifier,
        error: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        Self {
            identifier,
            error: Some(error.into()),
            log: log.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the fetch step against the shared source tree.
#[derive(Clone)]
pub struct FetchStage {
    step: Arc<dyn Step>,
    tree: SourceTree,
}

impl FetchStage {
    pub fn new(step: Arc<dyn Step>, tree: SourceTree) -> Self {
        Self { step, tree }
    }

    pub async fn fetch(&self, id: Identifier) -> FetchResult {
        debug!(identifier = %id, "fetching");
        let outcome = self.step.run(&id, &self.tree).await;
        if outcome.succeeded {
            FetchResult::ok(id, outcome.log)
        } else {
            let reason = outcome
                .log
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("fetch step failed")
                .trim()
                .to_string();
            warn!(identifier = %id, error = %reason, "fetch failed");
            FetchResult::failed(id, reason, outcome.log)
        }
    }

    /// Start `count` fetch workers. They exit once `jobs` closes.
    pub fn spawn(
        self,
        count: usize,
        jobs: mpsc::Receiver<Identifier>,
        results: mpsc::Sender<FetchResult>,
    ) -> Vec<JoinHandle<()>> {
        let stage = Arc::new(self);
        spawn_workers("fetch", count, jobs, results, move |id| {
            let stage = Arc::clone(&stage);
            async move { stage.fetch(id).await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedStep;

    #[tokio::test]
    async fn successful_fetch_has_no_error() {
        let step = Arc::new(ScriptedStep::passing("fetch"));
        let stage = FetchStage::new(step, SourceTree::new("/w"));
        let result = stage.fetch("a".into()).await;
        assert!(result.is_ok());
        assert_eq!(result.identifier.as_str(), "a");
    }

    #[tokio::test]
    async fn failed_fetch_reports_last_log_line() {
        let step = ScriptedStep::passing("fetch")
            .fail_for("bad", "cloning...\nrepository not found\n");
        let stage = FetchStage::new(Arc::new(step), SourceTree::new("/w"));

        let result = stage.fetch("bad".into()).await;
        assert!(!result.is_ok());
        assert_eq!(result.error.as_deref(), Some("repository not found"));
        assert!(result.log.contains("cloning"));
    }

    #[tokio::test]
    async fn workers_fetch_everything_sent() {
        let step = Arc::new(ScriptedStep::passing("fetch"));
        let stage = FetchStage::new(step, SourceTree::new("/w"));
        let (job_tx, job_rx) = mpsc::channel(4);
        let (res_tx, mut res_rx) = mpsc::channel(4);
        let handles = stage.spawn(2, job_rx, res_tx);

        for id in ["a", "b", "c"] {
            job_tx.send(Identifier::from(id)).await.unwrap();
        }
        drop(job_tx);

        let mut ids = Vec::new();
        while let Some(r) = res_rx.recv().await {
            ids.push(r.identifier.into_string());
        }
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
        for h in handles {
            h.await.unwrap();
        }
    }
}
