//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directory holding shared bridge state (`~/.autobridge`).
pub fn bridge_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".autobridge")
}

/// Root bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Preferred port; 0 lets the bridge negotiate one.
    #[serde(default)]
    pub port: u16,

    /// Bind attempts before the instance gives up.
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u32,

    /// Delay between a `shutdown` request and teardown.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// How long teardown waits for the worker before forcing it.
    #[serde(default = "default_await_termination_ms")]
    pub await_termination_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_attempts() -> u32 {
    5
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

fn default_await_termination_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            bind_attempts: default_bind_attempts(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            await_termination_ms: default_await_termination_ms(),
        }
    }
}

/// Prompt worker timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Ceiling for the "generation started" phase.
    #[serde(default = "default_phase_timeout_ms")]
    pub start_timeout_ms: u64,

    /// Ceiling for the "generation finished" phase.
    #[serde(default = "default_phase_timeout_ms")]
    pub finish_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after generation ends, before the response is read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Maximum queued prompts (0 = unlimited).
    #[serde(default)]
    pub max_queue_size: usize,
}

fn default_phase_timeout_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    1_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: default_phase_timeout_ms(),
            finish_timeout_ms: default_phase_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            max_queue_size: 0,
        }
    }
}

/// Instance registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry table location (default: `~/.autobridge/registry.json`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Records not refreshed within this window are dropped.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
}

fn default_stale_after_secs() -> u64 {
    30
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

impl RegistryConfig {
    /// Registry path with the default applied.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| bridge_home().join("registry.json"))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: None,
            stale_after_secs: default_stale_after_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
        }
    }
}

/// Command sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Programs that may appear as the first token of a command.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_command_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "pwd", "echo", "date", "whoami", "git", "cat", "head", "tail", "wc", "grep",
        "uname", "hostname", "which",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
            timeout_ms: default_command_timeout_ms(),
        }
    }
}

/// Node-type selectors used to locate controls on the target surface.
///
/// Each list is matched as a substring against a node's concrete type name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_input_types")]
    pub input_types: Vec<String>,

    #[serde(default = "default_submit_types")]
    pub submit_types: Vec<String>,

    #[serde(default = "default_stop_types")]
    pub stop_types: Vec<String>,

    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,

    #[serde(default = "default_chat_mode_types")]
    pub chat_mode_types: Vec<String>,

    #[serde(default = "default_model_picker_types")]
    pub model_picker_types: Vec<String>,

    #[serde(default = "default_new_session_types")]
    pub new_session_types: Vec<String>,

    /// Model alias -> label shown in the model picker.
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, String>,

    /// Type-name prefix applied to the `diagnoseUI` histogram.
    #[serde(default)]
    pub diagnostics_prefix: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_input_types() -> Vec<String> {
    strings(&["PromptTextArea", "ChatInput", "PromptField"])
}

fn default_submit_types() -> Vec<String> {
    strings(&["SendButton", "SubmitAction"])
}

fn default_stop_types() -> Vec<String> {
    strings(&["StopButton", "StopAction"])
}

fn default_response_types() -> Vec<String> {
    strings(&["MarkdownPane", "MessageContent", "ResponsePanel"])
}

fn default_chat_mode_types() -> Vec<String> {
    strings(&["ChatModeComboBox", "ChatModePicker"])
}

fn default_model_picker_types() -> Vec<String> {
    strings(&["ModelPickPanel", "ModelComboBox"])
}

fn default_new_session_types() -> Vec<String> {
    strings(&["NewChatButton", "NewSessionAction"])
}

fn default_models() -> BTreeMap<String, String> {
    [
        ("gpt", "GPT-5"),
        ("gpt41", "GPT-4.1"),
        ("gpt4o", "GPT-4o"),
        ("gemini-pro", "Gemini 2.5 Pro"),
        ("claude-sonnet4", "Claude Sonnet 4"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            input_types: default_input_types(),
            submit_types: default_submit_types(),
            stop_types: default_stop_types(),
            response_types: default_response_types(),
            chat_mode_types: default_chat_mode_types(),
            model_picker_types: default_model_picker_types(),
            new_session_types: default_new_session_types(),
            models: default_models(),
            diagnostics_prefix: None,
        }
    }
}
