//! Build stage: the fixed per-identifier step sequence.
//!
//! metadata → compile → format → test → lints, then VCS metadata. Step
//! failures are recorded on the [`ResultRecord`], never raised. A metadata
//! failure skips every build step; a compile failure skips the steps that
//! need a compiled package. VCS metadata is collected in every case.

use std::sync::Arc;

use chrono::Utc;
use depcrawl_state::{ResultRecord, StepOutcome};
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::fetch::FetchResult;
use crate::pool::spawn_workers;
use crate::steps::{SourceTree, StepSet};
use crate::vcs::VcsSet;

#[derive(Debug, Clone)]
pub struct BuildPipeline {
    steps: StepSet,
    vcs: VcsSet,
    tree: SourceTree,
}

impl BuildPipeline {
    pub fn new(steps: StepSet, vcs: VcsSet, tree: SourceTree) -> Self {
        Self { steps, vcs, tree }
    }

    pub fn tree(&self) -> &SourceTree {
        &self.tree
    }

    pub fn steps(&self) -> &StepSet {
        &self.steps
    }

    /// Run every step for a successfully fetched identifier.
    pub async fn process(&self, fetched: FetchResult) -> ResultRecord {
        let id = fetched.identifier;
        let mut record = ResultRecord::new(id.clone());
        record.fetch = Some(StepOutcome::passed(fetched.log));

        match self.steps.metadata.probe(&id, &self.tree).await {
            Ok(build_info) => {
                record.build_info = build_info;
                self.run_build_steps(&mut record).await;
            }
            Err(e) => warn!(identifier = %id, error = %e, "import metadata unavailable"),
        }

        record.repository = self.vcs.probe(&id, &self.tree).await;
        record.recorded_at = Utc::now();

        info!(
            identifier = %id,
            compiled = record.compiled(),
            tests_passed = record.tests_passed(),
            imports = record.build_info.imports.len(),
            "built"
        );
        record
    }

    async fn run_build_steps(&self, record: &mut ResultRecord) {
        let id = record.identifier.clone();
        let tree = &self.tree;

        let compile = self.steps.compile.run(&id, tree).await;
        let compiled = compile.succeeded;
        record.compile = Some(compile);
        if !compiled {
            debug!(identifier = %id, "compile failed, skipping checks");
            return;
        }

        record.format = Some(self.steps.format.run(&id, tree).await);
        record.test = Some(self.steps.test.run(&id, tree).await);

        let lints = join_all(self.steps.lints.iter().map(|check| {
            let id = &id;
            async move { (check.name().to_string(), check.run(id, tree).await) }
        }))
        .await;
        record.lints.extend(lints);
    }

    /// Start `count` build workers. They exit once `jobs` closes.
    pub fn spawn(
        self,
        count: usize,
        jobs: mpsc::Receiver<FetchResult>,
        results: mpsc::Sender<ResultRecord>,
    ) -> Vec<JoinHandle<()>> {
        let pipeline = Arc::new(self);
        spawn_workers("build", count, jobs, results, move |fetched| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.process(fetched).await }
        })
    }
}
