//! Registry records.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::process::is_process_running;

/// One running bridge instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub port: u16,
    /// Target the instance automates.
    pub project_path: PathBuf,
    pub agent_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub pid: u32,
    pub last_seen: DateTime<Utc>,
}

impl InstanceRecord {
    /// Record for the current process, seen now.
    pub fn new(
        port: u16,
        project_path: impl Into<PathBuf>,
        agent_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            port,
            project_path: project_path.into(),
            agent_name: agent_name.into(),
            description: description.into(),
            role: None,
            capabilities: Vec::new(),
            pid: std::process::id(),
            last_seen: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Option<String>) -> Self {
        self.role = role;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether the record was refreshed within `stale_after` of `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        now.signed_duration_since(self.last_seen) <= stale_after
    }

    /// Fresh and owned by a live process.
    pub fn is_live(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.is_fresh(now, stale_after) && is_process_running(self.pid)
    }
}
