//! Instance descriptor read from the automated target's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory under the target path holding bridge files.
pub const DESCRIPTOR_DIR: &str = ".autobridge";

/// Descriptor file name inside [`DESCRIPTOR_DIR`].
pub const DESCRIPTOR_FILE: &str = "agent.json";

/// Identity of one bridge instance, as configured next to its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    /// Stable instance id; generated at startup when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    pub agent_name: String,

    #[serde(default)]
    pub description: String,

    /// Negotiated port, or 0 for "pick one".
    #[serde(default)]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Standing instructions an orchestrator keeps for this agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AgentDescriptor {
    /// Descriptor location for a target directory.
    pub fn path_for(target: &Path) -> PathBuf {
        target.join(DESCRIPTOR_DIR).join(DESCRIPTOR_FILE)
    }

    /// Load the descriptor for a target directory.
    pub fn load(target: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_for(target);
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(&path)?;
        let descriptor: Self = serde_json::from_str(&content)?;
        if descriptor.agent_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "agentName".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(descriptor)
    }

    /// Write the descriptor for a target directory.
    pub fn save(&self, target: &Path) -> Result<(), ConfigError> {
        let path = Self::path_for(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Fallback name derived from the target directory.
    pub fn default_for(target: &Path) -> Self {
        let agent_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        Self {
            instance_id: None,
            agent_name,
            description: String::new(),
            port: 0,
            role: None,
            capabilities: Vec::new(),
            system_prompt: None,
        }
    }
}
