//! Registry errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another live instance already holds the port.
    #[error("Port {port} is already claimed by instance {owner}")]
    PortInUse { port: u16, owner: String },

    /// Failed to take the registry lock.
    #[error("Failed to lock registry at {path}: {reason}")]
    Lock { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Registry contents could not be encoded.
    #[error("Invalid registry data: {0}")]
    Json(#[from] serde_json::Error),
}
