//! Runner service entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lintbench_runner::infrastructure::http;
use lintbench_runner::{ConfigLoader, LedgerClient, Runner};

/// Static-analyzer benchmark runner.
#[derive(Debug, Parser)]
#[command(name = "lintbench-runner", version, about)]
struct Cli {
    /// Path to a YAML config file (defaults to runner.yaml in the working
    /// directory, merged with RUNNER_* environment variables).
    #[arg(long, env = "RUNNER_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tokio::fs::create_dir_all(&config.storage.repos_dir)
        .await
        .context("failed to create repos directory")?;
    tokio::fs::create_dir_all(&config.storage.metrics_dir)
        .await
        .context("failed to create metrics directory")?;

    let reporter = Arc::new(LedgerClient::new(
        config.ledger.base_url.clone(),
        Duration::from_secs(config.timeouts.ledger_request_secs),
    )?);
    let runner = Arc::new(Runner::new(&config, reporter));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "Runner service listening");
    axum::serve(listener, http::router(runner)).await?;

    Ok(())
}
