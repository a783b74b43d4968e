//! tankwatchd — the tankwatch daemon.
//!
//! Single binary that assembles the tankwatch subsystems:
//! - State store (redb) holding readings and forecasts
//! - Prediction engine + ingest coordinator
//! - REST API for sensors and dashboards
//!
//! # Usage
//!
//! ```text
//! tankwatchd serve --port 8080 --data-dir /var/lib/tankwatch
//! tankwatchd rebuild --config /etc/tankwatch.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use tankwatch_core::{SystemClock, TankwatchConfig};
use tankwatch_predict::{IngestCoordinator, PredictionEngine};
use tankwatch_state::StateStore;

#[derive(Parser)]
#[command(name = "tankwatchd", about = "tankwatch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Accept sensor readings and serve forecasts.
    Serve {
        /// Path to tankwatch.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Recompute every stored forecast from the raw readings.
    Rebuild {
        /// Path to tankwatch.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data directory for persistent state (overrides the config file).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tankwatchd=debug,tankwatch=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
        } => {
            let config = load_config(config.as_deref())?;
            let port = port.unwrap_or_else(|| config.port());
            let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
            run_serve(&config, port, data_dir).await
        }
        Command::Rebuild { config, data_dir } => {
            let config = load_config(config.as_deref())?;
            let data_dir = data_dir.unwrap_or_else(|| config.data_dir());
            run_rebuild(&config, data_dir)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TankwatchConfig> {
    match path {
        Some(path) => {
            let config = TankwatchConfig::from_file(path)?;
            info!(?path, "configuration loaded");
            Ok(config)
        }
        None => Ok(TankwatchConfig::default()),
    }
}

/// Open the store under `data_dir` and wire up the coordinator.
fn build_coordinator(
    config: &TankwatchConfig,
    data_dir: &Path,
) -> anyhow::Result<IngestCoordinator<StateStore>> {
    let engine_config = config.engine_config()?;

    // Ensure data directory exists.
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("tankwatch.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let clock = Arc::new(SystemClock::new(engine_config.timezone));
    info!(
        capacity = engine_config.capacity,
        window_hours = engine_config.recent_window_hours,
        timezone = %engine_config.timezone,
        "prediction engine initialized"
    );
    let engine = PredictionEngine::new(engine_config)?;

    Ok(IngestCoordinator::new(store, engine, clock))
}

async fn run_serve(config: &TankwatchConfig, port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("tankwatch daemon starting");

    let coordinator = Arc::new(build_coordinator(config, &data_dir)?);
    let router = tankwatch_api::build_router(coordinator);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("tankwatch daemon stopped");
    Ok(())
}

fn run_rebuild(config: &TankwatchConfig, data_dir: PathBuf) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config, &data_dir)?;
    let summary = coordinator.rebuild_forecasts(coordinator.now())?;
    info!(
        containers = summary.containers,
        stored = summary.inserted + summary.updated,
        skipped = summary.skipped,
        "rebuild complete"
    );
    Ok(())
}
