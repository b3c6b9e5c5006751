//! The chat-panel operations the bridge drives.

use std::fmt;

use async_trait::async_trait;

use crate::error::SurfaceError;
use crate::search::TypeHistogram;

/// Conversation mode of the chat panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    Ask,
    Agent,
}

impl ChatMode {
    /// Label the mode selector shows for this mode.
    pub fn label(&self) -> &'static str {
        match self {
            ChatMode::Ask => "Ask",
            ChatMode::Agent => "Agent",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Control described by [`ChatSurface::inspect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectTarget {
    ChatMode,
    Models,
    Input,
}

impl fmt::Display for InspectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectTarget::ChatMode => f.write_str("chat mode selector"),
            InspectTarget::Models => f.write_str("model picker"),
            InspectTarget::Input => f.write_str("prompt input"),
        }
    }
}

/// Chat panel of the automated target.
///
/// Boolean results distinguish "the control is not exposed" (`Ok(false)`)
/// from "touching the surface failed" (`Err`).
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Place `prompt` into the input and trigger submission.
    async fn submit_prompt(&self, prompt: &str) -> Result<bool, SurfaceError>;

    /// Whether the stop affordance is currently visible.
    async fn is_generating(&self) -> Result<bool, SurfaceError>;

    /// Number of response blocks currently rendered.
    async fn response_count(&self) -> Result<usize, SurfaceError>;

    /// Text of the most recent non-empty response block.
    async fn latest_response(&self) -> Result<Option<String>, SurfaceError>;

    async fn set_chat_mode(&self, mode: ChatMode) -> Result<bool, SurfaceError>;

    /// Select a model by the label the picker shows.
    async fn select_model(&self, label: &str) -> Result<bool, SurfaceError>;

    /// Start a fresh conversation.
    async fn new_session(&self) -> Result<bool, SurfaceError>;

    /// Node-type histogram of the whole chat panel.
    async fn diagnose(&self) -> Result<TypeHistogram, SurfaceError>;

    /// Human-readable description of one control.
    async fn inspect(&self, target: InspectTarget) -> Result<String, SurfaceError>;
}
