//! Command-line front end: turns a GitHub repository or a local directory
//! into a beginner-friendly tutorial.

use anyhow::{Context, Result};
use clap::{Args, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tutorflow::cache::JsonFileCache;
use tutorflow::config::TutorflowConfig;
use tutorflow::emit::FsEmitter;
use tutorflow::events::LoggingEventSink;
use tutorflow::llm::{build_provider, CallLog, LlmGateway};
use tutorflow::source::{GithubSource, LocalDirSource, SourceAcquirer, SourceFilters, DEFAULT_MAX_FILE_SIZE};
use tutorflow::tutorial::{
    build_tutorial_flow, generate_tutorial, TutorialComponents, TutorialRequest, DEFAULT_LANGUAGE,
    DEFAULT_MAX_ABSTRACTIONS,
};

/// Generate a tutorial for a GitHub codebase or local directory.
#[derive(Debug, Parser)]
#[command(name = "tutorflow", version, about)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Project name (derived from repo/directory if omitted).
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// GitHub personal access token.
    #[arg(short = 't', long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base directory for output.
    #[arg(short = 'o', long, default_value = "output")]
    output: PathBuf,

    /// Extra include patterns, added to the defaults (e.g. '*.rs').
    #[arg(short = 'i', long, num_args = 1..)]
    include: Vec<String>,

    /// Extra exclude patterns, added to the defaults (e.g. 'vendor/*').
    #[arg(short = 'e', long, num_args = 1..)]
    exclude: Vec<String>,

    /// Maximum file size in bytes.
    #[arg(short = 's', long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    max_size: u64,

    /// Attempts per generative stage.
    #[arg(short = 'r', long)]
    max_retries: Option<usize>,

    /// Seconds to wait between attempts.
    #[arg(short = 'w', long)]
    wait: Option<u64>,

    /// Language of the generated tutorial.
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// Bypass the response cache.
    #[arg(long)]
    no_cache: bool,

    /// Maximum number of abstractions (and chapters).
    #[arg(long, default_value_t = DEFAULT_MAX_ABSTRACTIONS)]
    max_abstractions: usize,

    /// Chapters written at once.
    #[arg(long)]
    batch_concurrency: Option<usize>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// URL of the GitHub repository.
    #[arg(long)]
    repo: Option<String>,

    /// Path to a local directory.
    #[arg(long)]
    dir: Option<PathBuf>,
}

fn init_tracing(verbose: bool, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("tutorflow=debug,info")
            } else {
                EnvFilter::try_new("tutorflow=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(verbose).with_file(false).with_line_number(false).compact())
            .try_init()?;
    }
    Ok(())
}

/// File, then environment, then flags.
fn resolve_config(cli: &Cli) -> Result<TutorflowConfig> {
    let base = match &cli.config {
        Some(path) => TutorflowConfig::load(path)?,
        None => TutorflowConfig::default(),
    };
    let mut config = base.with_env_from(|key| std::env::var(key).ok())?;

    if let Some(attempts) = cli.max_retries {
        config = config.with_max_attempts(attempts);
    }
    if let Some(wait) = cli.wait {
        config = config.with_wait_seconds(wait);
    }
    if let Some(limit) = cli.batch_concurrency {
        config = config.with_batch_concurrency(limit);
    }
    if cli.no_cache {
        config = config.with_cache(false);
    }
    Ok(config)
}

fn build_request(cli: &Cli, config: &TutorflowConfig) -> TutorialRequest {
    let request = TutorialRequest::new()
        .with_language(&cli.language)
        .with_max_abstractions(cli.max_abstractions)
        .with_cache(config.use_cache);
    match &cli.name {
        Some(name) => request.with_project_name(name),
        None => request,
    }
}

fn build_source(args: &SourceArgs, token: Option<String>) -> Result<Arc<dyn SourceAcquirer>> {
    match (&args.repo, &args.dir) {
        (Some(url), _) => {
            if token.as_deref().map_or(true, |t| t.trim().is_empty()) {
                tracing::warn!("No GitHub token provided; public API rate limits apply");
            }
            Ok(Arc::new(GithubSource::new(url, token)?))
        }
        (None, Some(dir)) => Ok(Arc::new(LocalDirSource::new(dir))),
        (None, None) => anyhow::bail!("either --repo or --dir is required"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let filters = SourceFilters::with_defaults(&cli.include, &cli.exclude, cli.max_size)?;
    let source = build_source(&cli.source, cli.token.clone())?;

    let provider = build_provider(&config.llm).context("Failed to configure the generative provider")?;
    let mut gateway = LlmGateway::new(provider).with_call_log(CallLog::new(&config.log_dir));
    if config.use_cache {
        gateway = gateway.with_cache(Arc::new(JsonFileCache::new(&config.cache_path)));
    }

    let emitter = FsEmitter::new(&cli.output);
    if let Some(name) = &cli.name {
        emitter.destination(name)?;
    }

    let components = TutorialComponents {
        source: source.clone(),
        filters,
        gateway,
        emitter: Arc::new(emitter),
    };
    let flow = build_tutorial_flow(components, &config, Arc::new(LoggingEventSink::default()))?;
    let request = build_request(&cli, &config);

    tracing::info!(
        source = %source.locator(),
        language = %request.language_label(),
        provider = %config.llm.provider,
        model = %config.llm.model_name(),
        "Starting tutorial generation"
    );

    let (state, report) = generate_tutorial(&flow, request)
        .await
        .context("Tutorial generation failed")?;

    tracing::info!(run_id = %report.run_id, duration_ms = report.duration_ms, "Run finished");
    println!(
        "Tutorial complete! {} chapters written to {}",
        state.chapters.len(),
        state.output_location.as_deref().unwrap_or("<unknown>")
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(run(cli))
}
