use std::sync::Arc;
use std::time::Duration;

use autobridge_config::AgentDescriptor;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::*;
use crate::test_support::{IdleSurface, ScriptedSurface, Toggle, test_state};

struct Harness {
    _dir: TempDir,
    state: Arc<BridgeState>,
    session: Session,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Harness {
    fn new(surface: Arc<dyn autobridge_surface::ChatSurface>) -> Self {
        let (dir, state) = test_state(surface);
        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.add("conn-1".to_string(), tx);
        let session = Session::new("conn-1", state.clone());
        Self {
            _dir: dir,
            state,
            session,
            rx,
        }
    }

    fn scripted(toggle: Toggle) -> Self {
        Self::new(Arc::new(ScriptedSurface::new(toggle)))
    }

    async fn send(&self, value: Value) {
        self.session.handle_text(&value.to_string()).await;
    }

    async fn next(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(10), self.rx.recv())
            .await
            .expect("reply in time")
            .expect("connection open");
        match frame {
            Outbound::Reply(reply) => serde_json::from_str(&reply.to_json()).unwrap(),
            Outbound::Pong => Value::String("pong".to_string()),
        }
    }

    async fn request(&mut self, value: Value) -> Value {
        self.send(value).await;
        self.next().await
    }
}

#[tokio::test]
async fn test_literal_ping() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    harness.session.handle_text("ping").await;
    assert_eq!(harness.next().await, "pong");
}

#[tokio::test]
async fn test_every_reply_carries_port() {
    let mut harness = Harness::scripted(Toggle::Works);
    for request in [
        json!({"type": "getPendingPrompts"}),
        json!({"type": "diagnoseUI"}),
        json!({"type": "nonsense"}),
        json!({"type": "copilotPrompt", "prompt": ""}),
    ] {
        let reply = harness.request(request).await;
        assert_eq!(reply["port"], 4100, "{}", reply);
        assert!(reply["type"].is_string());
        assert!(reply["status"].is_string());
    }
}

#[tokio::test]
async fn test_push_without_descriptor_is_error() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    harness.session.push_agent_config();

    let reply = harness.next().await;
    assert_eq!(reply["type"], "agentConfig");
    assert_eq!(reply["status"], "error");
    assert!(reply["message"].as_str().unwrap().contains("agent.json"));

    // The session keeps working.
    harness.session.handle_text("ping").await;
    assert_eq!(harness.next().await, "pong");
}

#[tokio::test]
async fn test_push_with_descriptor() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    let mut descriptor = AgentDescriptor::default_for(&harness.state.target);
    descriptor.agent_name = "Builder".to_string();
    descriptor.description = "Builds things".to_string();
    descriptor.port = 9999;
    descriptor.save(&harness.state.target).unwrap();

    harness.session.push_agent_config();
    let reply = harness.next().await;
    assert_eq!(reply["type"], "agentConfig");
    assert_eq!(reply["status"], "success");
    assert_eq!(reply["agentName"], "Builder");
    assert_eq!(reply["description"], "Builds things");
    assert_eq!(reply["instanceId"], "instance-1");
    assert_eq!(reply["port"], 4100);

    let again = harness.request(json!({"type": "getAgentConfig"})).await;
    assert_eq!(again["agentName"], "Builder");
}

#[tokio::test]
async fn test_unknown_type_keeps_session() {
    let mut harness = Harness::new(Arc::new(IdleSurface));

    let reply = harness.request(json!({"type": "launchRockets"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "Unknown message type: launchRockets");

    harness.session.handle_text("{not json").await;
    assert_eq!(harness.next().await["status"], "error");

    let reply = harness.request(json!({"type": "getPendingPrompts"})).await;
    assert_eq!(reply["status"], "success");
}

#[tokio::test]
async fn test_empty_prompt_rejected_without_queueing() {
    let mut harness = Harness::scripted(Toggle::Works);

    let reply = harness.request(json!({"type": "copilotPrompt", "prompt": "   "})).await;
    assert_eq!(reply["type"], "copilotPrompt");
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "prompt is empty");
    assert!(harness.state.queue.is_empty().await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.rx.try_recv().is_err());
}

#[tokio::test]
async fn test_prompt_executing_then_result() {
    let mut harness = Harness::scripted(Toggle::Works);

    let executing = harness
        .request(json!({"type": "copilotPrompt", "prompt": "ping test"}))
        .await;
    assert_eq!(executing["type"], "copilotPrompt");
    assert_eq!(executing["status"], "executing");
    assert_eq!(executing["queuePosition"], 1);

    let result = harness.next().await;
    assert_eq!(result["type"], "copilotPromptResult");
    assert_eq!(result["status"], "success");
    assert_eq!(result["prompt"], "ping test");
    assert_eq!(result["content"], "re: ping test");
    assert_eq!(result["taskId"], executing["taskId"]);
    assert_eq!(result["port"], 4100);
}

#[tokio::test]
async fn test_prompt_failure_is_error_result() {
    // Nothing is exposed, so the prompt cannot even be submitted.
    let mut harness = Harness::new(Arc::new(IdleSurface));

    assert_eq!(
        harness
            .request(json!({"type": "copilotPrompt", "prompt": "hello"}))
            .await["status"],
        "executing"
    );
    let result = harness.next().await;
    assert_eq!(result["type"], "copilotPromptResult");
    assert_eq!(result["status"], "error");
    assert!(result["message"].as_str().unwrap().contains("prompt input"));
}

#[tokio::test]
async fn test_current_and_pending_when_idle() {
    let mut harness = Harness::new(Arc::new(IdleSurface));

    let current = harness.request(json!({"type": "getCurrentPrompt"})).await;
    assert_eq!(current["type"], "currentPrompt");
    assert_eq!(current["status"], "success");
    assert!(current["currentPrompt"].is_null());

    let pending = harness.request(json!({"type": "getPendingPrompts"})).await;
    assert_eq!(pending["type"], "pendingPrompts");
    assert_eq!(pending["count"], 0);
    assert_eq!(pending["pendingPrompts"], json!([]));
}

#[tokio::test]
async fn test_prompt_refused_after_worker_stopped() {
    let mut harness = Harness::scripted(Toggle::Works);
    harness.state.worker.shutdown(Duration::from_secs(2)).await;

    // With the worker gone the queue is closed, so prompts are refused.
    let reply = harness
        .request(json!({"type": "copilotPrompt", "prompt": "late"}))
        .await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "bridge is shutting down");

    let pending = harness.request(json!({"type": "getPendingPrompts"})).await;
    assert_eq!(pending["count"], 0);
}

#[tokio::test]
async fn test_chat_mode_success_and_missing_and_throwing() {
    let mut works = Harness::scripted(Toggle::Works);
    let reply = works.request(json!({"type": "setAgentChatMode"})).await;
    assert_eq!(reply["type"], "setAgentChatMode");
    assert_eq!(reply["status"], "success");

    let mut missing = Harness::scripted(Toggle::Missing);
    let reply = missing.request(json!({"type": "setAskChatMode"})).await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "Ask chat mode is not available on the chat surface");

    let mut throws = Harness::scripted(Toggle::Throws);
    let reply = throws.request(json!({"type": "setAskChatMode"})).await;
    assert_eq!(reply["status"], "error");
    let message = reply["message"].as_str().unwrap();
    assert!(message.starts_with("Ask chat mode failed:"), "{}", message);
    assert!(message.contains("component disposed"), "{}", message);
}

#[tokio::test]
async fn test_model_aliases_resolve_to_labels() {
    let surface = Arc::new(ScriptedSurface::new(Toggle::Works));
    let mut harness = Harness::new(surface.clone());

    assert_eq!(harness.request(json!({"type": "setModelGPT4o"})).await["status"], "success");
    assert_eq!(
        harness.request(json!({"type": "setModelClaudeSonnet4"})).await["status"],
        "success"
    );
    assert_eq!(
        harness.request(json!({"type": "setModel", "model": "gemini-pro"})).await["status"],
        "success"
    );
    assert_eq!(
        harness.request(json!({"type": "setModel", "model": "o3-mini"})).await["status"],
        "success"
    );

    assert_eq!(
        *surface.changes.lock(),
        vec![
            "model:GPT-4o",
            "model:Claude Sonnet 4",
            "model:Gemini 2.5 Pro",
            "model:o3-mini",
        ]
    );
}

#[tokio::test]
async fn test_new_session() {
    let mut harness = Harness::scripted(Toggle::Missing);
    let reply = harness.request(json!({"type": "newAgentSession"})).await;
    assert_eq!(reply["type"], "newAgentSession");
    assert_eq!(reply["status"], "error");
}

#[tokio::test]
async fn test_diagnostics_and_inspection() {
    let mut harness = Harness::scripted(Toggle::Works);

    let reply = harness.request(json!({"type": "diagnoseUI"})).await;
    assert_eq!(reply["type"], "diagnostics");
    let report = reply["report"].as_str().unwrap();
    assert!(report.starts_with("4 nodes, 2 types"), "{}", report);
    assert!(report.contains("JButton"));

    let reply = harness.request(json!({"type": "inspectModels"})).await;
    assert_eq!(reply["type"], "inspectModels");
    assert_eq!(reply["report"], "model picker: ScriptedControl");
}

#[tokio::test]
async fn test_cli_rejected_command() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    std::fs::write(harness.state.target.join("keep.txt"), "x").unwrap();

    let reply = harness
        .request(json!({"type": "runCliCommand", "command": "ls; rm -rf /"}))
        .await;
    assert_eq!(reply["type"], "runCliCommand");
    assert_eq!(reply["status"], "error");
    assert!(harness.state.target.join("keep.txt").exists());

    let reply = harness.request(json!({"type": "runCliCommand"})).await;
    assert_eq!(reply["status"], "error");
}

#[cfg(unix)]
#[tokio::test]
async fn test_cli_runs_in_target() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    std::fs::write(harness.state.target.join("marker.txt"), "x").unwrap();

    let reply = harness
        .request(json!({"type": "runCliCommand", "command": "ls"}))
        .await;
    assert_eq!(reply["status"], "success");
    assert!(reply["output"].as_str().unwrap().contains("marker.txt"));
}

#[tokio::test]
async fn test_shutdown_request() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    let token = harness.state.shutdown_token();

    let reply = harness.request(json!({"type": "shutdown"})).await;
    assert_eq!(reply["type"], "shutdown");
    assert_eq!(reply["status"], "success");
    assert!(harness.state.is_shutdown_requested());

    tokio::time::timeout(Duration::from_secs(5), token.cancelled())
        .await
        .expect("teardown begins after the grace period");
}

#[tokio::test]
async fn test_result_for_closed_connection_is_dropped() {
    let mut harness = Harness::scripted(Toggle::Works);
    harness
        .send(json!({"type": "copilotPrompt", "prompt": "orphan"}))
        .await;
    assert_eq!(harness.next().await["status"], "executing");
    harness.state.connections.remove("conn-1");

    // The worker still finishes the task.
    for _ in 0..200 {
        if harness.state.worker.stats().completed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.state.worker.stats().completed, 1);
}

#[test]
fn test_sink_holds_result_until_released() {
    let connections = Arc::new(ConnectionManager::new(4100));
    let (tx, mut rx) = mpsc::unbounded_channel();
    connections.add("conn-1".to_string(), tx);

    let sink = PromptSink::new(connections, "conn-1".to_string());
    sink.deliver(TaskResult {
        task_id: Uuid::new_v4(),
        prompt: "fast".to_string(),
        outcome: TaskOutcome::Completed {
            content: "done".to_string(),
        },
    });
    assert!(rx.try_recv().is_err());

    sink.release();
    match rx.try_recv().unwrap() {
        Outbound::Reply(reply) => {
            assert_eq!(reply.kind, "copilotPromptResult");
            assert_eq!(reply.data["content"], "done");
        }
        other => panic!("unexpected frame: {:?}", other),
    }
}

#[tokio::test]
async fn test_discover_agents_flags_current_instance() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    let registry = &harness.state.registry;
    registry.register_instance("instance-1", harness.state.record()).unwrap();
    registry
        .register_instance(
            "other",
            autobridge_registry::InstanceRecord::new(4200, "/work/other", "other", "")
                .with_role(Some("coder".to_string())),
        )
        .unwrap();

    let reply = harness.request(json!({"type": "discoverAgents"})).await;
    assert_eq!(reply["status"], "success");
    assert_eq!(reply["count"], 2);

    let agents = reply["agents"].as_array().unwrap();
    let me = agents.iter().find(|a| a["instanceId"] == "instance-1").unwrap();
    assert_eq!(me["port"], 4100);
    assert_eq!(me["isCurrentInstance"], true);
    let other = agents.iter().find(|a| a["instanceId"] == "other").unwrap();
    assert_eq!(other["port"], 4200);
    assert_eq!(other["role"], "coder");
    assert_eq!(other["isCurrentInstance"], false);
}

#[tokio::test]
async fn test_agent_settings_update_descriptor_and_registry() {
    let mut harness = Harness::new(Arc::new(IdleSurface));

    let reply = harness.request(json!({"type": "setAgentRole", "role": "coder"})).await;
    assert_eq!(reply["status"], "success", "{}", reply);
    assert_eq!(reply["role"], "coder");

    let reply = harness
        .request(json!({"type": "setAgentCapabilities", "capabilities": ["kotlin", "review"]}))
        .await;
    assert_eq!(reply["capabilities"], json!(["kotlin", "review"]));

    let reply = harness
        .request(json!({"type": "setAgentSystemPrompt", "systemPrompt": "Answer in Kotlin."}))
        .await;
    assert_eq!(reply["status"], "success");

    let descriptor = harness.state.descriptor().unwrap();
    assert_eq!(descriptor.role.as_deref(), Some("coder"));
    assert_eq!(descriptor.capabilities, vec!["kotlin", "review"]);
    assert_eq!(descriptor.system_prompt.as_deref(), Some("Answer in Kotlin."));

    let record = harness.state.registry.get("instance-1").unwrap().unwrap();
    assert_eq!(record.role.as_deref(), Some("coder"));
    assert_eq!(record.capabilities, vec!["kotlin", "review"]);

    let config = harness.request(json!({"type": "getAgentConfig"})).await;
    assert_eq!(config["systemPrompt"], "Answer in Kotlin.");

    let reply = harness.request(json!({"type": "setAgentRole", "role": null})).await;
    assert_eq!(reply["role"], Value::Null);
    assert_eq!(harness.state.descriptor().unwrap().role, None);
}

#[tokio::test]
async fn test_agent_setting_with_bad_field_is_error() {
    let mut harness = Harness::new(Arc::new(IdleSurface));
    let reply = harness
        .request(json!({"type": "setAgentCapabilities", "capabilities": "kotlin"}))
        .await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["status"], "error");
    assert!(!AgentDescriptor::path_for(&harness.state.target).exists());
}

#[tokio::test]
async fn test_event_recording_captures_surface_calls() {
    let mut harness = Harness::scripted(Toggle::Works);

    let reply = harness.request(json!({"type": "stopEventRecording"})).await;
    assert_eq!(reply["status"], "error");

    let reply = harness.request(json!({"type": "startEventRecording"})).await;
    assert_eq!(reply["status"], "success");

    harness.request(json!({"type": "setAgentChatMode"})).await;
    harness.request(json!({"type": "newAgentSession"})).await;

    let reply = harness.request(json!({"type": "stopEventRecording"})).await;
    assert_eq!(reply["status"], "success");
    assert_eq!(reply["eventCount"], 2);
    let events: Vec<&str> = reply["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap())
        .collect();
    assert!(events[0].ends_with("set_chat_mode(Agent) -> true"), "{:?}", events);
    assert!(events[1].ends_with("new_session -> true"), "{:?}", events);
}
