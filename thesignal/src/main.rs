/*
thesignal - single-binary entry point.
Runs the ingestion pipeline once, on a recurring schedule, or reads back what it stored.
*/

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::{init_db_pool, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::select;
use tokio::sync::Notify;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use thesignal::fetch_job::FetchJob;
use thesignal::llm::remote::RemoteLlmProvider;
use thesignal::model::Category;
use thesignal::scoring::Scorer;
use thesignal::sources::search::SearchClient;
use thesignal::sources::social::{SocialDataClient, DEFAULT_SOCIAL_API_URL};
use thesignal::storage::SqliteStore;
use thesignal::thumbnails::PreviewImageFetcher;

const DEFAULT_SEARCH_URL: &str = "https://api.perplexity.ai/chat/completions";
const DEFAULT_SCORING_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Parser, Debug)]
#[command(name = "thesignal", about = "AI news ingestion: fetch, dedupe, score, store")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the fetch pipeline once and print the outcome
    Run,
    /// Run the fetch pipeline on the configured interval until Ctrl-C
    Worker,
    /// Show the last run and how many stories are stored
    Status,
    /// List the top recent stories
    Stories {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
        #[arg(long, default_value_t = 3)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config).await?;

    let db_path_abs = match tokio::fs::canonicalize(&config.database.path).await {
        Ok(p) => p.to_string_lossy().to_string(),
        Err(_) => config.database.path.clone(),
    };
    info!(db_path = %db_path_abs, "resolved DB path");

    let pool = match init_db_pool(&db_path_abs).await {
        Ok(p) => p,
        Err(e) => {
            error!(%e, db_path = %db_path_abs, "failed to initialize database pool");
            return Err(e);
        }
    };
    let store = Arc::new(SqliteStore::new(pool));
    store.ensure_schema().await?;

    match args.command {
        Command::Run => {
            let job = build_fetch_job(&config, store);
            let outcome = job.run().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Worker => {
            let job = build_fetch_job(&config, store);
            let shutdown_notify = Arc::new(Notify::new());
            let worker = run_worker(job, &config, shutdown_notify.clone());

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("ctrl-c received, notifying worker to shutdown");
                    shutdown_notify.notify_waiters();
                }
                _ = worker => {}
            }
            info!("worker stopped");
        }
        Command::Status => {
            let last_run = store.latest_run_log().await?;
            let total = store.count_stories().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "lastFetch": last_run,
                    "totalStories": total,
                }))?
            );
        }
        Command::Stories { category, limit, days } => {
            let stories = store
                .recent_stories(category, limit, chrono::Duration::days(days))
                .await?;
            println!("{}", serde_json::to_string_pretty(&stories)?);
        }
    }

    Ok(())
}

/// `config.default.toml` merged with `--config FILE`, or with `config.toml` when present.
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Wire the adapters, the scorer and the store into one job.
fn build_fetch_job(config: &Config, store: Arc<SqliteStore>) -> FetchJob {
    let search_provider = match config.search.as_ref() {
        Some(s) => RemoteLlmProvider::from_env(
            s.api_url.clone().unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            s.api_key_env.as_deref().unwrap_or("PERPLEXITY_API_KEY"),
            s.model.clone().unwrap_or_else(|| "sonar".to_string()),
        )
        .with_defaults(s.timeout_seconds.unwrap_or(60), 2000, 0.2),
        None => RemoteLlmProvider::from_env(DEFAULT_SEARCH_URL, "PERPLEXITY_API_KEY", "sonar"),
    };

    let social = match config.social.as_ref() {
        Some(s) => SocialDataClient::from_env(
            s.api_url.clone().unwrap_or_else(|| DEFAULT_SOCIAL_API_URL.to_string()),
            s.api_key_env.as_deref().unwrap_or("SOCIALDATA_API_KEY"),
            s.timeout_seconds.unwrap_or(20),
        ),
        None => SocialDataClient::from_env(DEFAULT_SOCIAL_API_URL, "SOCIALDATA_API_KEY", 20),
    };

    let scorer = match config.llm.as_ref() {
        Some(l) => {
            let max_tokens = l.max_tokens.unwrap_or(4096);
            let timeout = l.timeout_seconds.unwrap_or(120);
            let provider = RemoteLlmProvider::from_env(
                l.api_url.clone().unwrap_or_else(|| DEFAULT_SCORING_URL.to_string()),
                l.api_key_env.as_deref().unwrap_or("SCORING_API_KEY"),
                l.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            )
            .with_defaults(timeout, max_tokens, 0.2);
            info!(model = provider.model(), "scoring provider initialized");
            Scorer::new(Arc::new(provider)).with_limits(max_tokens, Some(timeout))
        }
        None => Scorer::new(Arc::new(RemoteLlmProvider::from_env(
            DEFAULT_SCORING_URL,
            "SCORING_API_KEY",
            "gpt-4o-mini",
        ))),
    };

    let thumbnails = config
        .thumbnails
        .as_ref()
        .filter(|t| t.enabled)
        .map(|t| PreviewImageFetcher::new(t.timeout_seconds.unwrap_or(3)));

    FetchJob::new(
        store.clone(),
        store,
        Arc::new(SearchClient::new(Arc::new(search_provider))),
        Arc::new(social),
        scorer,
    )
    .with_queries(config.search_queries())
    .with_accounts(config.account_usernames())
    .with_thumbnails(thumbnails)
}

/// Runs the job every `fetch_interval_minutes` until `shutdown_notify` is signalled.
async fn run_worker(job: FetchJob, config: &Config, shutdown_notify: Arc<Notify>) {
    let interval = Duration::from_secs(config.scheduler.fetch_interval_minutes.max(1) * 60);
    info!(
        interval_minutes = config.scheduler.fetch_interval_minutes,
        run_on_start = config.scheduler.run_on_start,
        "worker: scheduler initialized"
    );

    if config.scheduler.run_on_start {
        job.run().await;
    }

    loop {
        select! {
            _ = tokio::time::sleep(interval) => {
                job.run().await;
            },
            _ = shutdown_notify.notified() => {
                info!("worker: shutdown requested, exiting loop");
                break;
            }
        }
    }

    info!("worker: cleanup complete");
}
