//! depcrawl - dependency graph crawler CLI
//!
//! ## Commands
//!
//! - `crawl`: fetch, build, test and lint every package reachable from a seed list
//! - `list`: print the identifiers a named seed source provides
//! - `report`: query stored results (index, package, repo, files)

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use depcrawl_core::{
    BuildPipeline, CrawlConfig, CrawlReport, ExpansionMode, Identifier, KnownSet, Orchestrator,
    RetryPolicy, SeedSource, SourceTree, VcsSet, DEFAULT_BUILD_WORKERS, DEFAULT_FETCH_WORKERS,
    DEFAULT_INDEX_URL,
};
use depcrawl_state::{
    ResultBackend, ResultRecord, ResultStore, StoreConfig, SurrealConfig, SurrealResultStore,
    DEFAULT_DATABASE, DEFAULT_NAMESPACE,
};
use depcrawl_toolchain::GoToolchain;

#[derive(Parser)]
#[command(name = "depcrawl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Crawl a package dependency graph, building and checking every package",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from a seed list, recording one result per package
    Crawl(CrawlArgs),

    /// Print the identifiers provided by a seed source
    List {
        /// Source name ("index")
        source: String,

        /// Override the package index URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Query stored results
    Report {
        #[command(subcommand)]
        action: ReportAction,

        #[command(flatten)]
        store: SurrealArgs,
    },
}

#[derive(Subcommand)]
enum ReportAction {
    /// Table of every package with build, test and lint results
    Index,

    /// Full record for one package
    Package {
        identifier: String,

        /// Print the stored record as JSON
        #[arg(long)]
        raw: bool,
    },

    /// Packages sharing one repository
    Repo {
        /// Remote URL of the repository
        url: String,
    },

    /// Source files of one package
    Files { identifier: String },
}

#[derive(Args)]
struct CrawlArgs {
    /// Seed list file, one identifier per line
    #[arg(required_unless_present = "index")]
    seeds: Option<PathBuf>,

    /// Seed from a package index instead of a file
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = DEFAULT_INDEX_URL,
        conflicts_with = "seeds"
    )]
    index: Option<String>,

    /// Source tree fetched packages are placed into
    #[arg(long, env = "DEPCRAWL_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Concurrent build workers
    #[arg(long, env = "DEPCRAWL_BUILDERS", default_value_t = DEFAULT_BUILD_WORKERS)]
    builders: usize,

    /// Concurrent fetch workers
    #[arg(long, env = "DEPCRAWL_FETCHERS", default_value_t = DEFAULT_FETCH_WORKERS)]
    fetchers: usize,

    /// Process only the seeds, without following imports
    #[arg(long)]
    seeds_only: bool,

    /// Attempts per package when storing its result fails (0 = unlimited)
    #[arg(long, env = "DEPCRAWL_MAX_PERSIST_ATTEMPTS", default_value_t = 5)]
    max_persist_attempts: u32,

    /// Per-step timeout in seconds (0 = none)
    #[arg(long, env = "DEPCRAWL_STEP_TIMEOUT", default_value_t = 0)]
    step_timeout: u64,

    /// Toolchain root whose packages are skipped (default: `go env GOROOT`)
    #[arg(long, env = "GOROOT")]
    goroot: Option<PathBuf>,

    /// Where results go
    #[arg(long, value_enum, env = "DEPCRAWL_STORE", default_value_t = StoreKind::Memory)]
    store: StoreKind,

    #[command(flatten)]
    surreal: SurrealArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Keep results in memory and dump them to the log at exit
    Memory,
    /// Store results in SurrealDB
    Surreal,
}

#[derive(Args)]
struct SurrealArgs {
    /// SurrealDB endpoint ("ws://localhost:8000", "surrealkv://path")
    #[arg(long, global = true, env = "SURREALDB_ENDPOINT")]
    surreal_url: Option<String>,

    #[arg(long, global = true, env = "SURREALDB_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    #[arg(long, global = true, env = "SURREALDB_DATABASE", default_value = DEFAULT_DATABASE)]
    database: String,

    #[arg(long, global = true, env = "SURREALDB_USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "SURREALDB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Sign in as a root user
    #[arg(long, global = true)]
    root: bool,
}

impl SurrealArgs {
    fn config(&self) -> Result<SurrealConfig> {
        let endpoint = self
            .surreal_url
            .as_deref()
            .context("SurrealDB endpoint required (--surreal-url or SURREALDB_ENDPOINT)")?;

        let mut config = SurrealConfig::new(endpoint)
            .with_namespace(&self.namespace)
            .with_database(&self.database)
            .with_root(self.root);
        config.username = self.username.clone();
        config.password = self.password.clone();
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    depcrawl_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Crawl(args) => cmd_crawl(args).await,
        Commands::List { source, url } => cmd_list(&source, url).await,
        Commands::Report { action, store } => {
            let store = SurrealResultStore::connect(&store.config()?)
                .await
                .context("Failed to connect to result store")?;
            let output = match action {
                ReportAction::Index => render_index(&store).await?,
                ReportAction::Package { identifier, raw } => {
                    render_package(&store, &identifier, raw).await?
                }
                ReportAction::Repo { url } => render_repo(&store, &url).await?,
                ReportAction::Files { identifier } => render_files(&store, &identifier).await?,
            };
            print!("{output}");
            Ok(())
        }
    }
}

fn crawl_config(args: &CrawlArgs, source_root: PathBuf) -> Result<CrawlConfig> {
    let store = match args.store {
        StoreKind::Memory => StoreConfig::Memory,
        StoreKind::Surreal => StoreConfig::Surreal(args.surreal.config()?),
    };
    let seeds = match (&args.index, &args.seeds) {
        (Some(url), _) => SeedSource::Index { url: url.clone() },
        (None, Some(path)) => SeedSource::File(path.clone()),
        (None, None) => anyhow::bail!("a seed list file or --index is required"),
    };
    let retry = RetryPolicy {
        max_attempts: (args.max_persist_attempts > 0).then_some(args.max_persist_attempts),
        ..RetryPolicy::default()
    };
    let mode = if args.seeds_only {
        ExpansionMode::SeedsOnly
    } else {
        ExpansionMode::Follow
    };

    let mut config = CrawlConfig::new()
        .with_source_root(source_root)
        .with_build_workers(args.builders)
        .with_fetch_workers(args.fetchers)
        .with_mode(mode)
        .with_retry(retry)
        .with_store(store)
        .with_seeds(seeds)
        .with_step_timeout_secs(args.step_timeout);
    if let Some(goroot) = &args.goroot {
        config = config.with_known_root(goroot);
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_crawl(args: CrawlArgs) -> Result<()> {
    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| CrawlConfig::default().source_root);
    let workdir = absolute(&workdir)?;
    let config = crawl_config(&args, workdir)?;

    let seeds = match &config.seeds {
        Some(source) => source.load().await.context("Failed to read seeds")?,
        None => Vec::new(),
    };

    let backend = ResultBackend::open(&config.store)
        .await
        .context("Failed to open result store")?;

    tokio::fs::create_dir_all(&config.source_root)
        .await
        .with_context(|| format!("Failed to create {}", config.source_root.display()))?;

    let known = load_known_set(&config).await;
    let tree = SourceTree::new(&config.source_root);
    let toolchain = GoToolchain::new(tree.clone()).with_timeout_secs(config.step_timeout_secs);
    let pipeline = BuildPipeline::new(toolchain.step_set(), VcsSet::default(), tree);

    info!(
        workdir = %config.source_root.display(),
        seeds = seeds.len(),
        known = known.len(),
        "starting crawl"
    );
    let orchestrator = Orchestrator::new(pipeline, backend.sink(), &config).with_known(known);

    let report = tokio::select! {
        report = orchestrator.run(seeds) => Some(report),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping crawl");
            None
        }
    };

    if let Some(dump) = backend.dump() {
        let dump = dump.context("Failed to dump results")?;
        info!(results = %dump, "in-memory results");
    }
    if let Some(report) = report {
        print!("{}", render_crawl_report(&report));
    }
    Ok(())
}

async fn load_known_set(config: &CrawlConfig) -> KnownSet {
    let goroot = match &config.known_root {
        Some(root) => root.clone(),
        None => match depcrawl_toolchain::goroot().await {
            Ok(root) => root,
            Err(e) => {
                warn!(error = %e, "toolchain root unknown, no packages will be skipped");
                return KnownSet::empty();
            }
        },
    };
    let path = goroot.clone();
    tokio::task::spawn_blocking(move || KnownSet::from_toolchain_root(&path))
        .await
        .unwrap_or_else(|e| {
            warn!(goroot = %goroot.display(), error = %e, "scan of toolchain packages failed");
            KnownSet::empty()
        })
}

async fn cmd_list(source: &str, url: Option<String>) -> Result<()> {
    let source = match (SeedSource::from_name(source), url) {
        (Some(SeedSource::Index { .. }), Some(url)) => SeedSource::Index { url },
        (Some(source), _) => source,
        (None, _) => anyhow::bail!("unknown source: {source}"),
    };
    for id in source.load().await? {
        println!("{id}");
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to determine current directory")?
        .join(path))
}

fn render_crawl_report(report: &CrawlReport) -> String {
    format!(
        "persisted: {}\nfetch failed: {}\npersist failures: {}\nabandoned: {}\n",
        report.persisted, report.fetch_failed, report.persist_failures, report.abandoned
    )
}

fn pass_fail(outcome: Option<bool>) -> &'static str {
    match outcome {
        Some(true) => "ok",
        Some(false) => "FAIL",
        None => "-",
    }
}

fn index_row(record: &ResultRecord) -> String {
    format!(
        "{:<48} {:<5} {:<5} {:>4} {:>8} {:<10} {}",
        record.identifier.as_str(),
        pass_fail(record.compile.as_ref().map(|c| c.succeeded)),
        pass_fail(record.test.as_ref().map(|t| t.succeeded)),
        record.lint_defects("vet"),
        record.lint_defects("errcheck"),
        record.repository.revision.short_id(10),
        record.repository.remote_url,
    )
}

async fn render_index(store: &dyn ResultStore) -> Result<String> {
    let records = store.list().await.context("Failed to list results")?;
    let mut out = format!(
        "{:<48} {:<5} {:<5} {:>4} {:>8} {:<10} {}\n",
        "PACKAGE", "BUILD", "TEST", "VET", "ERRCHECK", "REVISION", "REPOSITORY"
    );
    for record in &records {
        out.push_str(&index_row(record));
        out.push('\n');
    }
    Ok(out)
}

async fn render_package(store: &dyn ResultStore, identifier: &str, raw: bool) -> Result<String> {
    let record = store
        .get(&Identifier::from(identifier))
        .await
        .with_context(|| format!("No result for {identifier}"))?;

    if raw {
        let mut json = serde_json::to_string_pretty(&record)?;
        json.push('\n');
        return Ok(json);
    }

    let mut out = String::new();
    let repo = &record.repository;
    writeln!(out, "package    {}", record.identifier)?;
    writeln!(out, "recorded   {}", record.recorded_at.to_rfc3339())?;
    if !repo.is_empty() {
        writeln!(out, "vcs        {} {}", repo.vcs_type, repo.root)?;
        writeln!(out, "revision   {}", repo.revision.id)?;
        writeln!(out, "author     {}", repo.revision.author)?;
        if let Some(date) = repo.revision.date {
            writeln!(out, "date       {}", date.to_rfc3339())?;
        }
        writeln!(out, "remote     {}", repo.remote_url)?;
    }
    writeln!(
        out,
        "build      {}",
        pass_fail(record.compile.as_ref().map(|c| c.succeeded))
    )?;
    writeln!(
        out,
        "test       {}",
        pass_fail(record.test.as_ref().map(|t| t.succeeded))
    )?;
    if let Some(format) = &record.format {
        writeln!(out, "format     {} files differ", format.defects)?;
    }
    for (name, check) in &record.lints {
        writeln!(out, "{:<10} {} findings", name, check.defects)?;
    }
    if record.build_info.uses_foreign_code {
        writeln!(out, "cgo        yes")?;
    }

    writeln!(out, "\nimports:")?;
    for import in record.imports() {
        writeln!(out, "  {import}")?;
    }

    let logs = [
        ("fetch", record.fetch.as_ref().map(|s| s.log.as_str())),
        ("build", record.compile.as_ref().map(|s| s.log.as_str())),
        ("test", record.test.as_ref().map(|s| s.log.as_str())),
    ];
    for (name, log) in logs {
        if let Some(log) = log.filter(|l| !l.trim().is_empty()) {
            writeln!(out, "\n{name} log:\n{}", log.trim_end())?;
        }
    }
    for (name, check) in &record.lints {
        if !check.log.trim().is_empty() {
            writeln!(out, "\n{name} log:\n{}", check.log.trim_end())?;
        }
    }
    Ok(out)
}

async fn render_repo(store: &dyn ResultStore, url: &str) -> Result<String> {
    let records = store
        .find_by_remote_url(url)
        .await
        .context("Failed to query repository")?;
    if records.is_empty() {
        anyhow::bail!("No packages recorded for {url}");
    }
    let mut out = String::new();
    for record in &records {
        out.push_str(&index_row(record));
        out.push('\n');
    }
    Ok(out)
}

async fn render_files(store: &dyn ResultStore, identifier: &str) -> Result<String> {
    let record = store
        .get(&Identifier::from(identifier))
        .await
        .with_context(|| format!("No result for {identifier}"))?;
    let mut out = String::new();
    for file in &record.build_info.source_files {
        writeln!(out, "{file}")?;
    }
    Ok(out)
}
