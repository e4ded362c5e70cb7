//! End-to-end crawl scenarios over scripted steps.
//!
//! Every scenario runs the real orchestrator, worker pools and channels; only
//! the toolchain, VCS and (where noted) the sink are fakes.

use std::sync::Arc;
use std::time::Duration;

use depcrawl_core::fakes::{FakeToolchain, ScriptedStep, StaticVcs};
use depcrawl_core::{
    BuildPipeline, CrawlConfig, CrawlReport, ExpansionMode, Identifier, KnownSet, Orchestrator,
    RetryPolicy, SourceTree, VcsSet,
};
use depcrawl_state::fakes::FlakySink;
use depcrawl_state::{MemoryResultStore, ResultSink, ResultStore};

fn vcs() -> VcsSet {
    VcsSet::new(vec![
        Arc::new(StaticVcs::empty("hg")),
        Arc::new(StaticVcs::new(
            "git",
            "c0ffee1",
            "/nonexistent/gopath/src/example.org/repo",
            "https://example.org/repo.git",
        )),
    ])
}

fn orchestrator(
    toolchain: &FakeToolchain,
    sink: Arc<dyn ResultSink>,
    config: &CrawlConfig,
) -> Orchestrator {
    let pipeline = BuildPipeline::new(
        toolchain.step_set(),
        vcs(),
        SourceTree::new("/nonexistent/gopath"),
    );
    Orchestrator::new(pipeline, sink, config)
}

async fn crawl(orchestrator: Orchestrator, seeds: &[&str]) -> CrawlReport {
    let seeds = seeds.iter().map(|s| Identifier::from(*s)).collect();
    tokio::time::timeout(Duration::from_secs(10), orchestrator.run(seeds))
        .await
        .expect("crawl did not halt")
}

fn ids(store: &MemoryResultStore) -> Vec<String> {
    store
        .identifiers()
        .into_iter()
        .map(Identifier::into_string)
        .collect()
}

#[tokio::test]
async fn seed_and_its_import_are_both_recorded_then_crawl_halts() {
    let toolchain = FakeToolchain::new().with_imports("pkgA", &["pkgB"]);
    let store = Arc::new(MemoryResultStore::new());

    let report = crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()),
        &["pkgA"],
    )
    .await;

    assert_eq!(ids(&store), vec!["pkgA", "pkgB"]);
    assert_eq!(report.persisted, 2);
    assert_eq!(toolchain.fetch_calls("pkgA"), 1);
    assert_eq!(toolchain.fetch_calls("pkgB"), 1);

    let a = store.get(&"pkgA".into()).await.unwrap();
    assert_eq!(a.repository.vcs_type, "git");
    assert_eq!(a.repository.root, "example.org/repo");
    assert!(a.fetch.is_some_and(|f| f.succeeded));
}

#[tokio::test]
async fn shared_dependencies_are_built_once() {
    let toolchain = FakeToolchain::new()
        .with_fetch(ScriptedStep::passing("fetch").with_delay(Duration::from_millis(5)))
        .with_imports("app", &["left", "right"])
        .with_imports("left", &["base"])
        .with_imports("right", &["base", "left"])
        .with_imports("base", &["app"]);
    let store = Arc::new(MemoryResultStore::new());
    let config = CrawlConfig::new().with_fetch_workers(3).with_build_workers(4);

    let report = crawl(orchestrator(&toolchain, store.clone(), &config), &["app", "app"]).await;

    assert_eq!(ids(&store), vec!["app", "base", "left", "right"]);
    assert_eq!(report.persisted, 4);
    for id in ["app", "base", "left", "right"] {
        assert_eq!(toolchain.fetch_calls(id), 1, "{id} fetched more than once");
    }
}

#[tokio::test]
async fn failed_insert_is_retried_until_it_sticks() {
    let toolchain = FakeToolchain::new().with_imports("pkgA", &["pkgB"]);
    let sink = Arc::new(FlakySink::new(MemoryResultStore::new()).failing("pkgA", 2));
    let config = CrawlConfig::new().with_retry(RetryPolicy::immediate(5));

    let report = crawl(orchestrator(&toolchain, sink.clone(), &config), &["pkgA"]).await;

    assert_eq!(sink.attempts("pkgA"), 3);
    assert_eq!(toolchain.fetch_calls("pkgA"), 3);
    assert_eq!(toolchain.fetch_calls("pkgB"), 1);
    assert_eq!(ids(sink.inner()), vec!["pkgA", "pkgB"]);
    assert_eq!(report.persist_failures, 2);
    assert_eq!(report.abandoned, 0);
}

#[tokio::test]
async fn imports_of_an_unstored_record_are_not_expanded() {
    let toolchain = FakeToolchain::new().with_imports("pkgA", &["pkgB"]);
    let sink = Arc::new(FlakySink::always_failing(MemoryResultStore::new()));
    let config = CrawlConfig::new().with_retry(RetryPolicy::immediate(2));

    let report = crawl(orchestrator(&toolchain, sink.clone(), &config), &["pkgA"]).await;

    assert_eq!(sink.attempts("pkgA"), 2);
    assert_eq!(toolchain.fetch_calls("pkgB"), 0);
    assert!(sink.inner().is_empty());
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.persisted, 0);
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_the_retry() {
    let toolchain = FakeToolchain::new();
    let sink = Arc::new(FlakySink::new(MemoryResultStore::new()).failing("slow", 1));
    let config = CrawlConfig::new().with_retry(RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let report = crawl(orchestrator(&toolchain, sink.clone(), &config), &["slow"]).await;

    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(report.persisted, 1);
    assert_eq!(sink.attempts("slow"), 2);
}

#[tokio::test]
async fn failed_compile_still_yields_repository_info() {
    let toolchain = FakeToolchain::new().failing_compile("broken");
    let store = Arc::new(MemoryResultStore::new());

    crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()),
        &["broken"],
    )
    .await;

    let record = store.get(&"broken".into()).await.unwrap();
    assert!(!record.compiled());
    assert!(record.test.is_none());
    assert_eq!(record.repository.revision.id, "c0ffee1");
    assert_eq!(record.repository.remote_url, "https://example.org/repo.git");
}

#[tokio::test]
async fn fetch_failure_is_terminal() {
    let toolchain = FakeToolchain::new()
        .with_imports("pkgA", &["gone"])
        .failing_fetch("gone");
    let store = Arc::new(MemoryResultStore::new());

    let report = crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()),
        &["pkgA"],
    )
    .await;

    assert_eq!(ids(&store), vec!["pkgA"]);
    assert_eq!(report.fetch_failed, 1);
    assert_eq!(toolchain.fetch_calls("gone"), 1);
}

#[tokio::test]
async fn metadata_failure_still_persists_a_record() {
    let toolchain = FakeToolchain::new().failing_metadata("odd");
    let store = Arc::new(MemoryResultStore::new());

    let report = crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()),
        &["odd"],
    )
    .await;

    assert_eq!(report.persisted, 1);
    let record = store.get(&"odd".into()).await.unwrap();
    assert!(record.compile.is_none());
    assert_eq!(record.repository.vcs_type, "git");
}

#[tokio::test]
async fn seeds_only_mode_ignores_imports() {
    let toolchain = FakeToolchain::new()
        .with_imports("one", &["dep"])
        .with_imports("two", &["dep"]);
    let store = Arc::new(MemoryResultStore::new());
    let config = CrawlConfig::new().with_mode(ExpansionMode::SeedsOnly);

    crawl(orchestrator(&toolchain, store.clone(), &config), &["one", "two"]).await;

    assert_eq!(ids(&store), vec!["one", "two"]);
    assert_eq!(toolchain.fetch_calls("dep"), 0);
}

#[tokio::test]
async fn known_packages_are_never_crawled() {
    let toolchain =
        FakeToolchain::new().with_imports("app", &["fmt", "net/http", "example.org/lib"]);
    let store = Arc::new(MemoryResultStore::new());
    let known: KnownSet = ["fmt", "net", "net/http"].into_iter().collect();

    crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()).with_known(known),
        &["app"],
    )
    .await;

    assert_eq!(ids(&store), vec!["app", "example.org/lib"]);
    assert_eq!(toolchain.fetch_calls("fmt"), 0);
}

#[tokio::test]
async fn empty_seed_list_finishes_immediately() {
    let toolchain = FakeToolchain::new();
    let store = Arc::new(MemoryResultStore::new());

    let report = crawl(
        orchestrator(&toolchain, store.clone(), &CrawlConfig::default()),
        &[],
    )
    .await;

    assert_eq!(report, CrawlReport::default());
    assert!(store.is_empty());
}
