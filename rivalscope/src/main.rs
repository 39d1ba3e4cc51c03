/*
rivalscope - single-binary main.rs
Serves the digest API, or builds one digest and prints it with --print-digest.
*/

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use common::{init_db_pool, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use rivalscope::llm;
use rivalscope::pipeline::DigestPipeline;
use rivalscope::server::{launch_rocket, AppState};
use rivalscope::storage;

#[derive(Parser, Debug)]
#[command(name = "rivalscope", about = "Competitive-intelligence digest server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Build one digest with N summaries, print it as JSON and exit
    #[arg(long, value_name = "N")]
    print_digest: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = match args.config {
        Some(p) => {
            if !p.exists() {
                error!(path = ?p, "specified config file not found");
                return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
            }
            Some(p)
        }
        None => Some(PathBuf::from("config.toml")).filter(|p| p.exists()),
    };

    let config = match Config::load_with_defaults(
        Some(default_path.as_path()).filter(|p| p.exists()),
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let db_pool = match init_db_pool(&config.database.path).await {
        Ok(p) => p,
        Err(e) => {
            error!(db_path = %config.database.path, "failed to initialize database pool: {:#}", e);
            return Err(e);
        }
    };
    storage::ensure_schema(&db_pool).await?;
    let seeded = storage::seed_sources(&db_pool, &config.sources).await?;
    info!("{} configured sources present in registry", seeded);

    let provider = llm::create_provider(config.llm.as_ref())?;
    let llm_adapter = config
        .llm
        .as_ref()
        .and_then(|l| l.adapter.clone())
        .unwrap_or_else(|| "ollama".to_string());
    info!("LLM provider initialized: {} ({})", llm_adapter, provider.model());
    let llm_model = provider.model().to_string();

    let pipeline = Arc::new(DigestPipeline::from_config(&config, provider)?);

    if let Some(requested) = args.print_digest {
        return print_digest(&db_pool, &pipeline, requested).await;
    }

    let state = AppState {
        started_at: Utc::now(),
        db: db_pool,
        pipeline,
        llm_adapter,
        llm_model,
    };

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(state, config.server.as_ref()).await {
        error!("Rocket server failed: {:#}", e);
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn print_digest(db: &sqlx::SqlitePool, pipeline: &DigestPipeline, requested: usize) -> Result<()> {
    let sources: Vec<String> = storage::list_sources(db)
        .await?
        .into_iter()
        .map(|s| s.url)
        .collect();

    let digest = pipeline.run(&sources, requested).await;
    println!("{}", serde_json::to_string_pretty(&digest)?);
    Ok(())
}
