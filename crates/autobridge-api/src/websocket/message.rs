//! WebSocket message types.
//!
//! Requests are flat JSON objects routed by their `type` field. Every reply
//! carries `type`, `status` and the instance's `port`; the literal text
//! `ping` is answered with the literal text `pong`.

use std::fmt;

use autobridge_surface::{ChatMode, InspectTarget};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// Which model a `setModel*` request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChoice {
    /// Key into the configured model labels.
    Alias(&'static str),
    /// Label (or alias) supplied by the client.
    Named(String),
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelChoice::Alias(alias) => f.write_str(alias),
            ModelChoice::Named(name) => f.write_str(name),
        }
    }
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeRequest {
    CopilotPrompt { prompt: String },
    GetCurrentPrompt,
    GetPendingPrompts,
    GetAgentConfig,
    DiagnoseUi,
    Inspect(InspectTarget),
    SetChatMode(ChatMode),
    SetModel(ModelChoice),
    NewAgentSession,
    RunCliCommand { command: String },
    DiscoverAgents,
    /// `None` clears the role.
    SetAgentRole { role: Option<String> },
    SetAgentCapabilities { capabilities: Vec<String> },
    /// `None` clears the system prompt.
    SetAgentSystemPrompt { system_prompt: Option<String> },
    StartEventRecording,
    StopEventRecording,
    Shutdown,
}

/// A request together with the `type` it arrived under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub kind: String,
    pub request: BridgeRequest,
}

impl IncomingMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| BridgeError::InvalidMessage(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(BridgeError::InvalidMessage("expected a JSON object".to_string()));
        };
        let kind = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or(BridgeError::MissingType)?
            .to_string();

        let request = match kind.as_str() {
            "copilotPrompt" => BridgeRequest::CopilotPrompt {
                prompt: string_field(&fields, "prompt").unwrap_or_default(),
            },
            "getCurrentPrompt" => BridgeRequest::GetCurrentPrompt,
            "getPendingPrompts" => BridgeRequest::GetPendingPrompts,
            "getAgentConfig" => BridgeRequest::GetAgentConfig,
            "diagnoseUI" => BridgeRequest::DiagnoseUi,
            "inspectChatMode" => BridgeRequest::Inspect(InspectTarget::ChatMode),
            "inspectModels" => BridgeRequest::Inspect(InspectTarget::Models),
            "inspectInput" => BridgeRequest::Inspect(InspectTarget::Input),
            "setAskChatMode" => BridgeRequest::SetChatMode(ChatMode::Ask),
            "setAgentChatMode" => BridgeRequest::SetChatMode(ChatMode::Agent),
            "setModelGPT" => BridgeRequest::SetModel(ModelChoice::Alias("gpt")),
            "setModelGPT41" => BridgeRequest::SetModel(ModelChoice::Alias("gpt41")),
            "setModelGPT4o" => BridgeRequest::SetModel(ModelChoice::Alias("gpt4o")),
            "setModelGeminiPro" => BridgeRequest::SetModel(ModelChoice::Alias("gemini-pro")),
            "setModelClaudeSonnet4" => BridgeRequest::SetModel(ModelChoice::Alias("claude-sonnet4")),
            "setModel" => BridgeRequest::SetModel(ModelChoice::Named(required(&fields, &kind, "model")?)),
            "newAgentSession" => BridgeRequest::NewAgentSession,
            "runCliCommand" => BridgeRequest::RunCliCommand {
                command: required(&fields, &kind, "command")?,
            },
            "discoverAgents" => BridgeRequest::DiscoverAgents,
            "setAgentRole" => BridgeRequest::SetAgentRole {
                role: nullable(&fields, &kind, "role")?,
            },
            "setAgentCapabilities" => BridgeRequest::SetAgentCapabilities {
                capabilities: string_list(&fields, &kind, "capabilities")?,
            },
            "setAgentSystemPrompt" => BridgeRequest::SetAgentSystemPrompt {
                system_prompt: nullable(&fields, &kind, "systemPrompt")?,
            },
            "startEventRecording" => BridgeRequest::StartEventRecording,
            "stopEventRecording" => BridgeRequest::StopEventRecording,
            "shutdown" => BridgeRequest::Shutdown,
            _ => return Err(BridgeError::UnknownType(kind)),
        };

        Ok(Self { kind, request })
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    fields.get(name).and_then(Value::as_str).map(str::to_string)
}

fn required(fields: &Map<String, Value>, kind: &str, name: &'static str) -> Result<String, BridgeError> {
    string_field(fields, name).ok_or_else(|| BridgeError::MissingField {
        kind: kind.to_string(),
        field: name,
    })
}

/// A present string field, where `null` or a blank string means "none".
fn nullable(fields: &Map<String, Value>, kind: &str, name: &'static str) -> Result<Option<String>, BridgeError> {
    match fields.get(name) {
        Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        _ => Err(BridgeError::MissingField {
            kind: kind.to_string(),
            field: name,
        }),
    }
}

/// An array of strings; blank entries are dropped.
fn string_list(fields: &Map<String, Value>, kind: &str, name: &'static str) -> Result<Vec<String>, BridgeError> {
    let invalid = || BridgeError::InvalidField {
        kind: kind.to_string(),
        field: name,
        expected: "an array of strings",
    };
    let Some(Value::Array(items)) = fields.get(name) else {
        return Err(invalid());
    };
    let mut list = Vec::with_capacity(items.len());
    for item in items {
        let item = item.as_str().ok_or_else(invalid)?.trim();
        if !item.is_empty() {
            list.push(item.to_string());
        }
    }
    Ok(list)
}

/// Reply status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
    Executing,
}

/// A JSON reply.
///
/// `port` is stamped by the session right before the reply is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsReply {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
    pub port: u16,
}

impl WsReply {
    fn new(kind: impl Into<String>, status: ReplyStatus) -> Self {
        Self {
            kind: kind.into(),
            status,
            message: None,
            data: Map::new(),
            port: 0,
        }
    }

    pub fn success(kind: impl Into<String>) -> Self {
        Self::new(kind, ReplyStatus::Success)
    }

    pub fn executing(kind: impl Into<String>) -> Self {
        Self::new(kind, ReplyStatus::Executing)
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let mut reply = Self::new(kind, ReplyStatus::Error);
        reply.message = Some(message.into());
        reply
    }

    /// Add a payload field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Merge every field of a JSON object into the payload.
    ///
    /// Keys owned by the envelope are skipped.
    pub fn merge(mut self, value: Value) -> Self {
        if let Value::Object(fields) = value {
            for (key, value) in fields {
                if !matches!(key.as_str(), "type" | "status" | "message" | "port") {
                    self.data.insert(key, value);
                }
            }
        }
        self
    }

    pub fn on_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn to_json(&self) -> String {
        // A map of JSON values always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A frame queued for one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Reply(WsReply),
    /// Literal `pong` text.
    Pong,
}

impl From<WsReply> for Outbound {
    fn from(reply: WsReply) -> Self {
        Outbound::Reply(reply)
    }
}
