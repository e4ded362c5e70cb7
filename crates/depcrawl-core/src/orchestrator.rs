//! The crawl hub.
//!
//! One task owns the frontier and every per-identifier counter. It waits on
//! all stage channels at once and services whichever is ready:
//!
//! ```text
//! seeds → Frontier → fetch workers → (ok) → build workers → record → sink
//!            ↑                                                        │
//!            └──────── imports (ok) / reset + re-queue (err) ─────────┘
//! ```
//!
//! The loop ends when the frontier is empty and nothing is in flight.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use depcrawl_state::{Identifier, ResultRecord, ResultSink};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::build::BuildPipeline;
use crate::config::{CrawlConfig, ExpansionMode, RetryPolicy};
use crate::fetch::{FetchResult, FetchStage};
use crate::frontier::Frontier;
use crate::known::KnownSet;

/// Totals for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Records successfully inserted
    pub persisted: usize,
    pub fetch_failed: usize,
    /// Failed inserts, including those later retried successfully
    pub persist_failures: usize,
    /// Identifiers given up on after exhausting the retry policy
    pub abandoned: usize,
}

/// What happens to an identifier whose record could not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistRetry {
    Now,
    After(Duration),
    Abandon,
}

/// Frontier plus in-flight bookkeeping. Synchronous and owned by the
/// orchestrator loop.
#[derive(Debug)]
pub struct CrawlState {
    frontier: Frontier,
    ready: VecDeque<FetchResult>,
    fetching: usize,
    building: usize,
    delayed: usize,
    failed_persists: HashMap<Identifier, u32>,
    known: KnownSet,
    mode: ExpansionMode,
    retry: RetryPolicy,
    report: CrawlReport,
}

impl CrawlState {
    pub fn new(known: KnownSet, mode: ExpansionMode, retry: RetryPolicy) -> Self {
        Self {
            frontier: Frontier::new(),
            ready: VecDeque::new(),
            fetching: 0,
            building: 0,
            delayed: 0,
            failed_persists: HashMap::new(),
            known,
            mode,
            retry,
            report: CrawlReport::default(),
        }
    }

    /// Push seeds, returning how many were newly admitted.
    pub fn seed(&mut self, seeds: impl IntoIterator<Item = Identifier>) -> usize {
        seeds
            .into_iter()
            .filter(|id| self.frontier.push(id.clone()))
            .count()
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn has_pending(&self) -> bool {
        !self.frontier.is_empty()
    }

    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Pop the next identifier to fetch.
    pub fn take_for_fetch(&mut self) -> Option<Identifier> {
        let id = self.frontier.pop()?;
        self.fetching += 1;
        Some(id)
    }

    pub fn on_fetched(&mut self, result: FetchResult) {
        self.fetching = self.fetching.saturating_sub(1);
        if result.is_ok() {
            self.ready.push_back(result);
        } else {
            self.report.fetch_failed += 1;
        }
    }

    /// Next fetched identifier to hand to a build worker.
    pub fn take_for_build(&mut self) -> Option<FetchResult> {
        let fetched = self.ready.pop_front()?;
        self.building += 1;
        Some(fetched)
    }

    pub fn on_built(&mut self) {
        self.building = self.building.saturating_sub(1);
    }

    /// Record stored: expand the frontier with its imports. Returns the
    /// identifiers newly admitted.
    pub fn on_persisted(&mut self, record: &ResultRecord) -> Vec<Identifier> {
        self.failed_persists.remove(&record.identifier);
        self.report.persisted += 1;

        if self.mode == ExpansionMode::SeedsOnly {
            return Vec::new();
        }
        record
            .imports()
            .filter(|import| !self.known.contains(import.as_str()))
            .filter(|import| self.frontier.push((*import).clone()))
            .cloned()
            .collect()
    }

    /// Record not stored: decide whether the identifier goes round again.
    ///
    /// An immediate retry resets and re-pushes here; a delayed one is
    /// re-pushed through [`CrawlState::on_requeue`]. An abandoned identifier
    /// stays seen.
    pub fn on_persist_failed(&mut self, id: &Identifier) -> PersistRetry {
        self.report.persist_failures += 1;
        let failures = self.failed_persists.entry(id.clone()).or_insert(0);
        *failures += 1;
        let failures = *failures;

        if !self.retry.allows(failures + 1) {
            self.failed_persists.remove(id);
            self.report.abandoned += 1;
            return PersistRetry::Abandon;
        }

        let delay = self.retry.delay_for(failures);
        if delay.is_zero() {
            self.requeue(id.clone());
            PersistRetry::Now
        } else {
            self.delayed += 1;
            PersistRetry::After(delay)
        }
    }

    /// A delayed retry has come due.
    pub fn on_requeue(&mut self, id: Identifier) {
        self.delayed = self.delayed.saturating_sub(1);
        self.requeue(id);
    }

    fn requeue(&mut self, id: Identifier) {
        self.frontier.reset(&id);
        self.frontier.push(id);
    }

    /// Nothing pending and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.frontier.is_empty()
            && self.ready.is_empty()
            && self.fetching == 0
            && self.building == 0
            && self.delayed == 0
    }

    pub fn report(&self) -> &CrawlReport {
        &self.report
    }

    pub fn into_report(self) -> CrawlReport {
        self.report
    }
}

/// Wires the frontier, both worker pools and the sink together.
pub struct Orchestrator {
    fetch: FetchStage,
    pipeline: BuildPipeline,
    sink: Arc<dyn ResultSink>,
    known: KnownSet,
    mode: ExpansionMode,
    retry: RetryPolicy,
    fetch_workers: usize,
    build_workers: usize,
}

impl Orchestrator {
    pub fn new(pipeline: BuildPipeline, sink: Arc<dyn ResultSink>, config: &CrawlConfig) -> Self {
        let fetch = FetchStage::new(pipeline.steps().fetch.clone(), pipeline.tree().clone());
        Self {
            fetch,
            pipeline,
            sink,
            known: KnownSet::empty(),
            mode: config.mode,
            retry: config.retry,
            fetch_workers: config.fetch_workers,
            build_workers: config.build_workers,
        }
    }

    /// Identifiers that are never pushed during expansion.
    pub fn with_known(mut self, known: KnownSet) -> Self {
        self.known = known;
        self
    }

    /// Crawl from `seeds` until nothing is left to do.
    #[instrument(skip_all, fields(seeds = seeds.len()))]
    pub async fn run(self, seeds: Vec<Identifier>) -> CrawlReport {
        let Orchestrator {
            fetch,
            pipeline,
            sink,
            known,
            mode,
            retry,
            fetch_workers,
            build_workers,
        } = self;

        let (fetch_tx, fetch_rx) = mpsc::channel::<Identifier>(1);
        let (fetched_tx, mut fetched_rx) = mpsc::channel::<FetchResult>(fetch_workers.max(1));
        let (build_tx, build_rx) = mpsc::channel::<FetchResult>(1);
        let (record_tx, mut record_rx) = mpsc::channel::<ResultRecord>(build_workers.max(1));
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<Identifier>();

        let mut workers = fetch.spawn(fetch_workers, fetch_rx, fetched_tx);
        workers.extend(pipeline.spawn(build_workers, build_rx, record_tx));

        let mut state = CrawlState::new(known, mode, retry);
        let admitted = state.seed(seeds);
        info!(admitted, fetch_workers, build_workers, ?mode, "crawl started");

        while !state.is_idle() {
            tokio::select! {
                permit = fetch_tx.reserve(), if state.has_pending() => {
                    let Ok(permit) = permit else {
                        error!("fetch workers stopped");
                        break;
                    };
                    if let Some(id) = state.take_for_fetch() {
                        debug!(identifier = %id, "dispatch fetch");
                        permit.send(id);
                    }
                }
                Some(result) = fetched_rx.recv() => {
                    state.on_fetched(result);
                }
                permit = build_tx.reserve(), if state.has_ready() => {
                    let Ok(permit) = permit else {
                        error!("build workers stopped");
                        break;
                    };
                    if let Some(fetched) = state.take_for_build() {
                        debug!(identifier = %fetched.identifier, "dispatch build");
                        permit.send(fetched);
                    }
                }
                Some(record) = record_rx.recv() => {
                    state.on_built();
                    persist(sink.as_ref(), &mut state, record, &requeue_tx).await;
                }
                Some(id) = requeue_rx.recv() => {
                    debug!(identifier = %id, "re-queued after backoff");
                    state.on_requeue(id);
                }
                else => {
                    warn!("all stage channels closed");
                    break;
                }
            }
        }

        drop(fetch_tx);
        drop(build_tx);
        join_all(workers).await;

        let report = state.into_report();
        info!(
            persisted = report.persisted,
            fetch_failed = report.fetch_failed,
            persist_failures = report.persist_failures,
            abandoned = report.abandoned,
            "crawl finished"
        );
        report
    }
}

async fn persist(
    sink: &dyn ResultSink,
    state: &mut CrawlState,
    record: ResultRecord,
    requeue_tx: &mpsc::UnboundedSender<Identifier>,
) {
    let id = record.identifier.clone();
    match sink.insert(&record).await {
        Ok(()) => {
            let expanded = state.on_persisted(&record);
            debug!(identifier = %id, expanded = expanded.len(), "persisted");
        }
        Err(e) => match state.on_persist_failed(&id) {
            PersistRetry::Now => {
                warn!(identifier = %id, error = %e, "insert failed, re-queued");
            }
            PersistRetry::After(delay) => {
                warn!(
                    identifier = %id,
                    error = %e,
                    ?delay,
                    "insert failed, retrying after backoff"
                );
                let tx = requeue_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(id);
                });
            }
            PersistRetry::Abandon => {
                error!(identifier = %id, error = %e, "insert failed, giving up");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depcrawl_state::BuildInfo;

    fn record_with_imports(id: &str, imports: &[&str]) -> ResultRecord {
        let mut record = ResultRecord::new(id.into());
        record.build_info = BuildInfo {
            imports: imports.iter().map(|s| Identifier::from(*s)).collect(),
            ..BuildInfo::default()
        };
        record
    }

    fn state() -> CrawlState {
        CrawlState::new(KnownSet::empty(), ExpansionMode::Follow, RetryPolicy::immediate(3))
    }

    #[test]
    fn persisted_imports_enter_the_frontier_once() {
        let mut state = state();
        state.seed(["X".into()]);
        let _ = state.take_for_fetch();

        let admitted = state.on_persisted(&record_with_imports("X", &["A", "B"]));
        assert_eq!(admitted.len(), 2);
        assert!(state.frontier().contains("A"));
        assert!(state.frontier().contains("B"));
        assert_eq!(state.frontier().len(), 2);

        let again = state.on_persisted(&record_with_imports("Y", &["A", "B", "X"]));
        assert!(again.is_empty());
        assert_eq!(state.frontier().len(), 2);
    }

    #[test]
    fn known_imports_are_not_expanded() {
        let known: KnownSet = ["fmt", "os"].into_iter().collect();
        let mut state = CrawlState::new(known, ExpansionMode::Follow, RetryPolicy::default());

        let admitted = state.on_persisted(&record_with_imports("X", &["fmt", "os", "ext/lib"]));
        assert_eq!(admitted, vec![Identifier::from("ext/lib")]);
    }

    #[test]
    fn seeds_only_never_expands() {
        let mut state =
            CrawlState::new(KnownSet::empty(), ExpansionMode::SeedsOnly, RetryPolicy::default());
        assert!(state.on_persisted(&record_with_imports("X", &["A"])).is_empty());
        assert!(state.frontier().is_empty());
    }

    #[test]
    fn failed_persist_requeues_without_expanding() {
        let mut state = state();
        state.seed(["X".into()]);
        assert_eq!(state.take_for_fetch(), Some("X".into()));

        assert_eq!(state.on_persist_failed(&"X".into()), PersistRetry::Now);
        assert!(state.frontier().contains("X"));
        assert!(!state.frontier().contains("A"));
        assert_eq!(state.report().persist_failures, 1);
    }

    #[test]
    fn retries_stop_at_the_attempt_limit() {
        let mut state = state();
        let id: Identifier = "X".into();
        state.seed([id.clone()]);

        for _ in 0..2 {
            state.take_for_fetch();
            assert_eq!(state.on_persist_failed(&id), PersistRetry::Now);
        }
        state.take_for_fetch();
        assert_eq!(state.on_persist_failed(&id), PersistRetry::Abandon);

        assert_eq!(state.report().abandoned, 1);
        assert!(state.frontier().is_empty());
        assert!(state.frontier().was_seen("X"));
    }

    #[test]
    fn delayed_retry_keeps_the_crawl_busy() {
        let retry = RetryPolicy {
            max_attempts: None,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(80),
        };
        let mut state = CrawlState::new(KnownSet::empty(), ExpansionMode::Follow, retry);

        assert_eq!(
            state.on_persist_failed(&"X".into()),
            PersistRetry::After(Duration::from_millis(10))
        );
        assert!(!state.is_idle());

        state.on_requeue("X".into());
        assert!(state.frontier().contains("X"));

        state.take_for_fetch();
        assert_eq!(
            state.on_persist_failed(&"X".into()),
            PersistRetry::After(Duration::from_millis(20))
        );
    }

    #[test]
    fn success_after_failure_clears_the_attempt_count() {
        let mut state = state();
        let id: Identifier = "X".into();
        state.on_persist_failed(&id);
        state.on_persist_failed(&id);
        state.on_persisted(&record_with_imports("X", &[]));

        assert_eq!(state.on_persist_failed(&id), PersistRetry::Now);
    }

    #[test]
    fn idle_tracks_every_stage() {
        let mut state = state();
        assert!(state.is_idle());

        state.seed(["X".into()]);
        assert!(!state.is_idle());

        let id = state.take_for_fetch().unwrap();
        assert!(!state.is_idle());

        state.on_fetched(FetchResult::ok(id, ""));
        assert!(!state.is_idle());

        state.take_for_build().unwrap();
        assert!(!state.is_idle());

        state.on_built();
        assert!(state.is_idle());
    }

    #[test]
    fn failed_fetch_is_terminal() {
        let mut state = state();
        state.seed(["X".into()]);
        let id = state.take_for_fetch().unwrap();
        state.on_fetched(FetchResult::failed(id, "not found", ""));

        assert!(!state.has_ready());
        assert!(state.is_idle());
        assert_eq!(state.report().fetch_failed, 1);
    }
}
