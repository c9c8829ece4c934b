//! Infoscreen Server
//!
//! Run with: cargo run --bin infoscreen [-- --config path/to/config.toml]
//!
//! Loads configuration, starts the background poller and the display board,
//! and serves the API until Ctrl+C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use infoscreen::api::{serve, AppState};
use infoscreen::config::{Config, LoggingConfig};
use infoscreen::{Services, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "infoscreen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lobby infoscreen backend")]
struct Args {
    /// Config file (default: standard locations, then environment)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path).with_context(|| format!("loading {:?}", path))?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging)?;
    tracing::info!("Starting infoscreen v{}", env!("CARGO_PKG_VERSION"));

    let services = Services::from_config(&config, Arc::new(SystemClock))
        .context("building services from configuration")?;

    for entry in services.poller.schedule() {
        tracing::info!(source = %entry.name, interval_secs = entry.interval_secs, "Polling source");
    }

    let board_task = services.board.start();
    services.poller.start().await;

    let state = AppState::new(
        Arc::clone(&services.poller),
        Arc::clone(&services.board),
        config.api.clone(),
    )
    .with_long_poll(Duration::from_secs(config.display.long_poll_secs));

    let served = serve(state).await;

    tracing::info!("Stopping poller...");
    services.poller.stop().await;
    services.board.stop().await;
    if let Err(e) = board_task.await {
        tracing::warn!(error = %e, "Display board task ended abnormally");
    }

    served.context("serving API")?;
    tracing::info!("Infoscreen shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("infoscreen={},tower_http=info", logging.level).into()
    });

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }

    Ok(())
}
