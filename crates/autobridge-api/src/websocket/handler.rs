//! WebSocket handler implementation.
//!
//! Each connection gets a [`Session`]. Immediate requests are answered in
//! the connection's own task; prompts go through the work queue and are
//! answered twice: `executing` right away, then one `copilotPromptResult`
//! when the worker is done with them.

use std::sync::Arc;
use std::time::Duration;

use autobridge_config::AgentDescriptor;
use autobridge_surface::{SurfaceError, render_histogram};
use autobridge_workqueue::{QueueError, ResultSink, Task, TaskOutcome, TaskResult};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::BridgeError;
use crate::state::{BridgeState, off_runtime};

use super::connection::ConnectionManager;
use super::message::{BridgeRequest, IncomingMessage, ModelChoice, Outbound, WsReply};

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    state.connections.add(connection_id.clone(), tx);
    info!(
        "WebSocket connected: {} ({} open)",
        connection_id,
        state.connections.connection_count()
    );

    // Spawn sender task
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match frame {
                Outbound::Reply(reply) => reply.to_json(),
                Outbound::Pong => "pong".to_string(),
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let session = Session::new(connection_id.clone(), state.clone());
    session.push_agent_config();

    let closed = state.sessions_closed();
    loop {
        let next = tokio::select! {
            _ = closed.cancelled() => {
                debug!("Closing session {} for shutdown", connection_id);
                break;
            }
            next = receiver.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => {
                info!("WebSocket closed: {}", connection_id);
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Dropping the only sender lets the writer flush what is queued and close.
    state.connections.remove(&connection_id);
    if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
        warn!("Writer for {} did not finish flushing", connection_id);
    }
    info!("WebSocket disconnected: {}", connection_id);
}

/// Request handling for one connection.
pub struct Session {
    id: String,
    state: Arc<BridgeState>,
}

impl Session {
    pub fn new(id: impl Into<String>, state: Arc<BridgeState>) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn send(&self, reply: WsReply) {
        if !self.state.connections.send_to(&self.id, reply) {
            debug!("Dropping reply for closed connection {}", self.id);
        }
    }

    /// Push the instance descriptor, or the reason it could not be read.
    pub fn push_agent_config(&self) {
        let reply = match self.state.descriptor() {
            Ok(descriptor) => self.agent_config(&descriptor),
            Err(e) => {
                warn!("Agent config unavailable for {}: {}", self.id, e);
                WsReply::error("agentConfig", format!("Failed to load agent config: {}", e))
            }
        };
        self.send(reply);
    }

    fn agent_config(&self, descriptor: &AgentDescriptor) -> WsReply {
        WsReply::success("agentConfig")
            .merge(serde_json::to_value(descriptor).unwrap_or(Value::Null))
            .with("instanceId", self.state.instance_id.as_str())
            .with("projectPath", self.state.target.display().to_string())
    }

    /// Handle one text frame.
    pub async fn handle_text(&self, text: &str) {
        if text.trim() == "ping" {
            self.state.connections.send_frame(&self.id, Outbound::Pong);
            return;
        }
        debug!("Received on {}: {}", self.id, text);

        match IncomingMessage::parse(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => {
                warn!("Rejected message on {}: {}", self.id, e);
                self.send(WsReply::error("error", e.to_string()));
            }
        }
    }

    async fn dispatch(&self, message: IncomingMessage) {
        let IncomingMessage { kind, request } = message;
        let state = &self.state;

        let reply = match request {
            BridgeRequest::CopilotPrompt { prompt } => return self.submit_prompt(kind, prompt).await,
            BridgeRequest::GetCurrentPrompt => {
                let current = state.worker.current();
                WsReply::success("currentPrompt")
                    .with("currentPrompt", serde_json::to_value(current).unwrap_or(Value::Null))
            }
            BridgeRequest::GetPendingPrompts => {
                let pending = state.queue.snapshot().await;
                WsReply::success("pendingPrompts")
                    .with("count", pending.len())
                    .with("pendingPrompts", serde_json::to_value(pending).unwrap_or(Value::Null))
            }
            BridgeRequest::GetAgentConfig => match state.descriptor() {
                Ok(descriptor) => self.agent_config(&descriptor),
                Err(e) => WsReply::error("agentConfig", format!("Failed to load agent config: {}", e)),
            },
            BridgeRequest::DiagnoseUi => match state.surface.diagnose().await {
                Ok(histogram) => WsReply::success("diagnostics").with("report", render_histogram(&histogram)),
                Err(e) => WsReply::error("diagnostics", format!("Diagnostics failed: {}", e)),
            },
            BridgeRequest::Inspect(target) => match state.surface.inspect(target).await {
                Ok(report) => WsReply::success(kind).with("report", report),
                Err(e) => WsReply::error(kind, format!("Failed to inspect {}: {}", target, e)),
            },
            BridgeRequest::SetChatMode(mode) => {
                let result = state.surface.set_chat_mode(mode).await;
                surface_toggle(kind, &format!("{} chat mode", mode), result)
            }
            BridgeRequest::SetModel(choice) => match self.model_label(&choice) {
                Some(label) => {
                    let result = state.surface.select_model(&label).await;
                    surface_toggle(kind, &format!("Model {}", label), result)
                }
                None => WsReply::error(kind, format!("No model label configured for {}", choice)),
            },
            BridgeRequest::NewAgentSession => {
                let result = state.surface.new_session().await;
                surface_toggle(kind, "New session", result)
            }
            BridgeRequest::RunCliCommand { command } => match state.sandbox.run(&command).await {
                Ok(output) => WsReply::success("runCliCommand").with("output", output),
                Err(e) => WsReply::error("runCliCommand", e.to_string()),
            },
            BridgeRequest::DiscoverAgents => self.discover_agents(kind).await,
            BridgeRequest::SetAgentRole { role } => {
                let value = Value::from(role.clone());
                let result = state.update_descriptor(move |d| d.role = role).await;
                descriptor_update(kind, "role", value, result)
            }
            BridgeRequest::SetAgentCapabilities { capabilities } => {
                let value = Value::from(capabilities.clone());
                let result = state.update_descriptor(move |d| d.capabilities = capabilities).await;
                descriptor_update(kind, "capabilities", value, result)
            }
            BridgeRequest::SetAgentSystemPrompt { system_prompt } => {
                let value = Value::from(system_prompt.clone());
                let result = state.update_descriptor(move |d| d.system_prompt = system_prompt).await;
                descriptor_update(kind, "systemPrompt", value, result)
            }
            BridgeRequest::StartEventRecording => {
                if state.recorder.start() {
                    debug!("Previous event recording discarded by {}", self.id);
                }
                let mut reply = WsReply::success(kind);
                reply.message = Some("Event recording started".to_string());
                reply
            }
            BridgeRequest::StopEventRecording => match state.recorder.stop() {
                Some(recorded) => WsReply::success(kind)
                    .with("eventCount", recorded.events.len())
                    .with("droppedEvents", recorded.dropped)
                    .with("events", recorded.events),
                None => WsReply::error(kind, "Event recording is not active"),
            },
            BridgeRequest::Shutdown => {
                state.request_shutdown();
                let mut reply = WsReply::success("shutdown");
                reply.message = Some("Shutting down".to_string());
                reply
            }
        };

        self.send(reply);
    }

    /// Live instances on this host, this one flagged.
    async fn discover_agents(&self, kind: String) -> WsReply {
        let table = match off_runtime(&self.state.registry, |registry| registry.live()).await {
            Ok(table) => table,
            Err(e) => return WsReply::error(kind, format!("Agent discovery failed: {}", e)),
        };

        let agents: Vec<Value> = table
            .into_iter()
            .map(|(id, record)| {
                let current = id == self.state.instance_id;
                let mut agent = serde_json::to_value(record).unwrap_or(Value::Null);
                if let Value::Object(fields) = &mut agent {
                    fields.insert("instanceId".to_string(), Value::from(id));
                    fields.insert("isCurrentInstance".to_string(), Value::from(current));
                }
                agent
            })
            .collect();

        WsReply::success(kind)
            .with("count", agents.len())
            .with("agents", agents)
    }

    fn model_label(&self, choice: &ModelChoice) -> Option<String> {
        let models = &self.state.config.surface.models;
        match choice {
            ModelChoice::Alias(alias) => models.get(*alias).cloned(),
            ModelChoice::Named(name) => Some(models.get(name).cloned().unwrap_or_else(|| name.clone())),
        }
    }

    async fn submit_prompt(&self, kind: String, prompt: String) {
        if prompt.trim().is_empty() {
            self.send(WsReply::error(kind, QueueError::EmptyPrompt.to_string()));
            return;
        }

        let sink = Arc::new(PromptSink::new(self.state.connections.clone(), self.id.clone()));
        let task = Task::new(prompt.clone(), self.id.clone(), sink.clone());
        let task_id = task.id;

        match self.state.queue.enqueue(task).await {
            Ok(position) => {
                info!("Queued prompt {} from {} at position {}", task_id, self.id, position);
                self.send(
                    WsReply::executing(kind)
                        .with("prompt", prompt)
                        .with("taskId", task_id.to_string())
                        .with("queuePosition", position),
                );
                sink.release();
            }
            // The task never reached the worker, so this is its only reply.
            Err((_task, e)) => {
                warn!("Prompt from {} not queued: {}", self.id, e);
                self.send(WsReply::error(kind, e.to_string()));
            }
        }
    }
}

/// Translate a surface toggle into a reply.
///
/// `Ok(false)` means the control is not exposed; `Err` means touching it failed.
fn surface_toggle(kind: String, what: &str, result: Result<bool, SurfaceError>) -> WsReply {
    match result {
        Ok(true) => {
            let mut reply = WsReply::success(kind);
            reply.message = Some(format!("{} selected", what));
            reply
        }
        Ok(false) => WsReply::error(kind, format!("{} is not available on the chat surface", what)),
        Err(e) => {
            error!("{} failed: {}", what, e);
            WsReply::error(kind, format!("{} failed: {}", what, e))
        }
    }
}

fn descriptor_update(
    kind: String,
    field: &str,
    value: Value,
    result: Result<AgentDescriptor, BridgeError>,
) -> WsReply {
    match result {
        Ok(_) => {
            let mut reply = WsReply::success(kind).with(field, value);
            reply.message = Some(format!("Agent {} updated", field));
            reply
        }
        Err(e) => {
            warn!("Could not update agent {}: {}", field, e);
            WsReply::error(kind, format!("Failed to update agent {}: {}", field, e))
        }
    }
}

/// Routes a prompt's result back to the connection that submitted it.
///
/// A result that arrives before the `executing` reply went out is held
/// until [`PromptSink::release`].
struct PromptSink {
    connections: Arc<ConnectionManager>,
    connection_id: String,
    gate: Mutex<Gate>,
}

enum Gate {
    Held(Option<WsReply>),
    Open,
}

impl PromptSink {
    fn new(connections: Arc<ConnectionManager>, connection_id: String) -> Self {
        Self {
            connections,
            connection_id,
            gate: Mutex::new(Gate::Held(None)),
        }
    }

    fn release(&self) {
        let held = match std::mem::replace(&mut *self.gate.lock(), Gate::Open) {
            Gate::Held(held) => held,
            Gate::Open => None,
        };
        if let Some(reply) = held {
            self.forward(reply);
        }
    }

    fn forward(&self, reply: WsReply) {
        if !self.connections.send_to(&self.connection_id, reply) {
            debug!("Result for closed connection {} dropped", self.connection_id);
        }
    }
}

impl ResultSink for PromptSink {
    fn deliver(&self, result: TaskResult) {
        let reply = match result.outcome {
            TaskOutcome::Completed { content } => WsReply::success("copilotPromptResult")
                .with("prompt", result.prompt)
                .with("taskId", result.task_id.to_string())
                .with("content", content),
            TaskOutcome::Failed { reason } => WsReply::error("copilotPromptResult", reason)
                .with("prompt", result.prompt)
                .with("taskId", result.task_id.to_string()),
        };

        {
            let mut gate = self.gate.lock();
            if let Gate::Held(slot) = &mut *gate {
                *slot = Some(reply);
                return;
            }
        }
        self.forward(reply);
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
