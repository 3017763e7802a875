//! Roster Binary Entry Point
//!
//! Runs an employee system with its seed roster until interrupted.
//! Core functionality is provided by the `roster` library crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use roster::{
    BackpressureMode, EmployeeSystem, SystemBuilder,
    config::{AppConfig, DEFAULT_CONFIG_PATH, parse_duration},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Roster - Concurrent Employee Record Store
#[derive(Parser, Debug)]
#[command(name = "roster", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file [default: configs/roster.yaml]
    #[arg(short, long, env = "ROSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Change-event queue capacity (overrides config file)
    #[arg(long, env = "ROSTER_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Backpressure policy: timeout, drop or block (overrides config file)
    #[arg(long, env = "ROSTER_BACKPRESSURE")]
    backpressure: Option<BackpressureMode>,

    /// Publish timeout, e.g. "100ms" (overrides config file)
    #[arg(long, env = "ROSTER_PUBLISH_TIMEOUT", value_parser = parse_duration)]
    publish_timeout: Option<Duration>,

    /// Print final position statistics as JSON lines on exit
    #[arg(long)]
    dump_stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,roster=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Roster - Concurrent Employee Record Store");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; only a missing default file falls back to defaults
    let config_path = cli.config.as_deref();
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    tracing::info!(
        "Loading configuration from: {}",
        config_path.unwrap_or(default_path).display()
    );
    let mut config = AppConfig::load_or_default(config_path, default_path)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(capacity) = cli.queue_capacity {
        config.pipeline.queue_capacity = capacity;
    }
    if let Some(mode) = cli.backpressure {
        config.pipeline.backpressure = mode;
    }
    if let Some(timeout) = cli.publish_timeout {
        config.pipeline.publish_timeout = timeout;
    }
    config.validate()?;

    tracing::info!(
        "Store: ids >= {}, compensation {:.2} - {:.2}; Pipeline: capacity {}, backpressure {}",
        config.store.min_id,
        config.store.min_compensation,
        config.store.max_compensation,
        config.pipeline.queue_capacity,
        config.pipeline.backpressure,
    );

    let system = SystemBuilder::from_config(&config).build()?;

    let seeded = system.seed(&config);
    tracing::info!(
        "Seed roster loaded: {} of {} employees",
        seeded,
        config.seed.len()
    );

    tracing::info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    tracing::info!("Shutting down employee system...");
    system.shutdown()?;

    if cli.dump_stats {
        dump_stats(&system)?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Print every position's statistics as one JSON object per line.
fn dump_stats(system: &EmployeeSystem) -> Result<(), serde_json::Error> {
    for stats in system.all_position_stats() {
        println!("{}", serde_json::to_string(&stats)?);
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
