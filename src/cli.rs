//! CLI definitions for AutoBridge.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AutoBridge CLI.
#[derive(Parser)]
#[command(name = "autobridge")]
#[command(about = "Drive an introspected chat panel over WebSocket")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to ~/.autobridge/config.toml)
    #[arg(short, long, global = true, env = "AUTOBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run a bridge for a target directory (default)
    Run {
        /// Target project directory
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the preferred port
        #[arg(long)]
        port: Option<u16>,
    },

    /// List bridge instances from the registry
    Instances {
        /// Include entries whose owner is gone
        #[arg(long)]
        all: bool,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove entries whose owner is gone or whose heartbeat is stale
    Cleanup,
}
