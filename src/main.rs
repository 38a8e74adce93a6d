use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tabserve::{batch, config::AppConfig, model, observability, server};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "tabserve", version, about = "Serve or batch-score a persisted classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the model and serve /ping and /invocations.
    Serve {
        #[arg(long, env = "TABSERVE_CONFIG")]
        config: Option<PathBuf>,
        /// Overrides `model.dir` and SM_MODEL_DIR.
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Score CSV files under <base-dir>/input/test.
    Batch {
        #[arg(long, default_value = batch::DEFAULT_BASE_DIR)]
        base_dir: PathBuf,
        #[arg(long, env = "TABSERVE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Serve { config, model_dir } => serve(config, model_dir).await,
        Command::Batch { base_dir, config } => run_batch(base_dir, config).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

async fn serve(config: Option<PathBuf>, model_dir: Option<PathBuf>) -> anyhow::Result<()> {
    // 1. Load Config
    let mut config = load_config(config)?;
    if let Some(dir) = model_dir {
        config.model.dir = dir;
    }

    // 2. Init
    observability::init_tracing(&config.logging)?;
    let metrics = observability::init_metrics()?;
    model::onnx::init_ort()?;

    // 3. Load the model; failure here means the server never comes up
    let handle = model::load_with(&config.model.dir, &model::LoadOptions::from(&config.model))
        .with_context(|| format!("failed to load model from {}", config.model.dir.display()))?;

    let upkeep = metrics.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    // 4. Create Router
    let state = server::types::AppState {
        model: handle,
        metrics,
    };
    let app = server::routes::create_router(state, config.server.max_body_bytes);

    // 5. Bind & Serve
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(
        "Server listening on http://{}:{}",
        config.server.host, config.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_batch(base_dir: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    observability::init_tracing(&config.logging)?;
    info!(" ** Starting batch scoring. **");
    model::onnx::init_ort()?;

    let options = model::LoadOptions::from(&config.model);
    let output = tokio::task::spawn_blocking(move || batch::run(&base_dir, &options)).await??;

    info!(output = %output.display(), "Done");
    Ok(())
}
