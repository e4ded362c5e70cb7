//! Integration tests: a full crawl driven by real subprocesses.
//!
//! Shell commands stand in for the Go tools so the tests only need `sh` and
//! `git`. The fetch step creates a git checkout for each identifier.

use std::sync::Arc;

use depcrawl_core::{
    BuildPipeline, Check, CrawlConfig, Identifier, Orchestrator, SourceTree, Step, StepSet, VcsSet,
};
use depcrawl_state::{MemoryResultStore, ResultStore};
use depcrawl_toolchain::{CommandCheck, CommandRunner, CommandStep, GoListProbe, StepConfig};

fn sh(name: &str, script: &str) -> StepConfig {
    StepConfig::custom(
        name.to_string(),
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        60,
    )
}

const FETCH: &str = "mkdir -p '{dir}' && cd '{dir}' && git init -q && \
    git remote add origin 'https://example.org/{id}.git' && \
    git -c user.name=crawler -c user.email=crawler@example.org commit -q --allow-empty -m init";

const LIST: &str = r#"case '{id}' in
    pkgA) echo '{"GoFiles":["a.go"],"Imports":["fmt","pkgB"]}' ;;
    *) echo '{"GoFiles":["b.go"],"Imports":["fmt"]}' ;;
esac"#;

fn step_set(runner: &CommandRunner) -> StepSet {
    let step = |config: StepConfig| -> Arc<dyn Step> {
        Arc::new(CommandStep::new(config, runner.clone()))
    };
    let check = |config: StepConfig| -> Arc<dyn Check> {
        Arc::new(CommandCheck::new(config, runner.clone()))
    };

    StepSet {
        fetch: step(sh("fetch", FETCH)),
        metadata: Arc::new(
            GoListProbe::new(runner.clone(), 60).with_command(vec![
                "sh".to_string(),
                "-c".to_string(),
                LIST.to_string(),
            ]),
        ),
        compile: step(sh(
            "compile",
            "test '{id}' != pkgB || { echo 'b.go:3: syntax error'; exit 2; }",
        )),
        format: check(sh("format", "echo '{dir}/a.go'")),
        test: step(sh("test", "echo ok '{id}'")),
        lints: vec![check(
            sh("vet", "echo 'a.go:1: unreachable code'; echo 'a.go:9: bad printf'; exit 1")
                .with_accepted_exit_codes(vec![0, 1]),
        )],
    }
}

#[tokio::test]
async fn crawl_with_subprocess_steps_records_both_packages() {
    let work = tempfile::tempdir().unwrap();
    let tree = SourceTree::new(work.path());
    let runner = CommandRunner::new(tree.clone());
    let store = Arc::new(MemoryResultStore::new());

    let known = ["fmt"].into_iter().collect();
    let pipeline = BuildPipeline::new(step_set(&runner), VcsSet::default(), tree);
    let report = Orchestrator::new(pipeline, store.clone(), &CrawlConfig::default())
        .with_known(known)
        .run(vec![Identifier::from("pkgA")])
        .await;

    assert_eq!(report.persisted, 2);
    assert_eq!(
        store.identifiers(),
        vec![Identifier::from("pkgA"), Identifier::from("pkgB")]
    );

    let a = store.get(&"pkgA".into()).await.unwrap();
    assert!(a.compiled());
    assert!(a.tests_passed());
    assert_eq!(a.format.as_ref().map(|f| f.defects), Some(1));
    assert_eq!(a.lint_defects("vet"), 2);
    assert_eq!(a.build_info.source_files, vec!["a.go"]);
    assert_eq!(a.repository.vcs_type, "git");
    assert_eq!(a.repository.root, "pkgA");
    assert_eq!(a.repository.remote_url, "https://example.org/pkgA.git");
    assert_eq!(a.repository.revision.author, "crawler <crawler@example.org>");

    let b = store.get(&"pkgB".into()).await.unwrap();
    assert!(!b.compiled());
    assert!(b.compile.as_ref().is_some_and(|c| c.log.contains("syntax error")));
    assert!(b.test.is_none());
    assert_eq!(b.repository.vcs_type, "git");
}

#[tokio::test]
async fn failed_fetch_produces_no_record() {
    let work = tempfile::tempdir().unwrap();
    let tree = SourceTree::new(work.path());
    let runner = CommandRunner::new(tree.clone());
    let store = Arc::new(MemoryResultStore::new());

    let mut steps = step_set(&runner);
    steps.fetch = Arc::new(CommandStep::new(
        sh("fetch", "echo 'unrecognized import path {id}' >&2; exit 1"),
        runner.clone(),
    ));

    let pipeline = BuildPipeline::new(steps, VcsSet::default(), tree);
    let report = Orchestrator::new(pipeline, store.clone(), &CrawlConfig::default())
        .run(vec![Identifier::from("pkgA")])
        .await;

    assert_eq!(report.fetch_failed, 1);
    assert!(store.is_empty());
}
