//! AutoBridge - automation bridge for an introspected chat panel.
//!
//! Usage:
//!   autobridge                         # Run a bridge for the current directory
//!   autobridge run --target ./project  # Run a bridge for another directory
//!   autobridge instances               # Show live bridges on this machine
//!   autobridge cleanup                 # Drop registry entries of dead bridges

mod cli;
mod cmd_instances;
mod server;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use autobridge_config::{BridgeConfig, ConfigLoader, ConfigValidator, bridge_home};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

/// Keeps the non-blocking log writer alive for the lifetime of the process.
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize tracing with console output and daily rolling files under
/// `~/.autobridge/logs`.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = bridge_home().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("autobridge")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| bridge_home().join("config.toml"));
    let config = ConfigLoader::load_or_default(&path)?;
    info!("Configuration: {}", path.display());

    let result = ConfigValidator::validate(&config);
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        for e in &result.errors {
            error!("Config {}: {}", e.path, e.message);
        }
        return Err(format!("invalid configuration in {}", path.display()).into());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Instances { all, json }) => cmd_instances::list_instances(&config, all, json),
        Some(Commands::Cleanup) => cmd_instances::cleanup_instances(&config),
        Some(Commands::Run { target, host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run_bridge(config, resolve_target(target)?).await
        }
        None => server::run_bridge(config, resolve_target(None)?).await,
    }
}

fn resolve_target(target: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let target = match target {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    if !target.is_dir() {
        return Err(format!("target directory {} does not exist", target.display()).into());
    }
    Ok(std::fs::canonicalize(target)?)
}
