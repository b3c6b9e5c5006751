//! Surfaces and state builders shared by the unit tests.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use autobridge_config::BridgeConfig;
use autobridge_registry::InstanceRegistry;
use autobridge_surface::{ChatMode, ChatSurface, InspectTarget, SurfaceError, TypeHistogram};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::state::BridgeState;

/// A surface where nothing is exposed.
pub struct IdleSurface;

#[async_trait]
impl ChatSurface for IdleSurface {
    async fn submit_prompt(&self, _prompt: &str) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn is_generating(&self) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn response_count(&self) -> Result<usize, SurfaceError> {
        Ok(0)
    }

    async fn latest_response(&self) -> Result<Option<String>, SurfaceError> {
        Ok(None)
    }

    async fn set_chat_mode(&self, _mode: ChatMode) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn select_model(&self, _label: &str) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn new_session(&self) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn diagnose(&self) -> Result<TypeHistogram, SurfaceError> {
        Ok(TypeHistogram::new())
    }

    async fn inspect(&self, target: InspectTarget) -> Result<String, SurfaceError> {
        Ok(format!("no {} found", target))
    }
}

/// How scripted toggles respond.
#[derive(Clone, Copy)]
pub enum Toggle {
    Works,
    Missing,
    Throws,
}

/// A surface that answers every prompt instantly with `re: <prompt>`.
pub struct ScriptedSurface {
    toggle: Toggle,
    responses: Mutex<Vec<String>>,
    /// Every mode, model and session change, in call order.
    pub changes: Mutex<Vec<String>>,
}

impl ScriptedSurface {
    pub fn new(toggle: Toggle) -> Self {
        Self {
            toggle,
            responses: Mutex::new(Vec::new()),
            changes: Mutex::new(Vec::new()),
        }
    }

    fn change(&self, what: String) -> Result<bool, SurfaceError> {
        self.changes.lock().push(what.clone());
        match self.toggle {
            Toggle::Works => Ok(true),
            Toggle::Missing => Ok(false),
            Toggle::Throws => Err(SurfaceError::access(what, "component disposed")),
        }
    }
}

#[async_trait]
impl ChatSurface for ScriptedSurface {
    async fn submit_prompt(&self, prompt: &str) -> Result<bool, SurfaceError> {
        self.responses.lock().push(format!("re: {}", prompt));
        Ok(true)
    }

    async fn is_generating(&self) -> Result<bool, SurfaceError> {
        Ok(false)
    }

    async fn response_count(&self) -> Result<usize, SurfaceError> {
        Ok(self.responses.lock().len())
    }

    async fn latest_response(&self) -> Result<Option<String>, SurfaceError> {
        Ok(self.responses.lock().last().cloned())
    }

    async fn set_chat_mode(&self, mode: ChatMode) -> Result<bool, SurfaceError> {
        self.change(format!("mode:{}", mode))
    }

    async fn select_model(&self, label: &str) -> Result<bool, SurfaceError> {
        self.change(format!("model:{}", label))
    }

    async fn new_session(&self) -> Result<bool, SurfaceError> {
        self.change("session".to_string())
    }

    async fn diagnose(&self) -> Result<TypeHistogram, SurfaceError> {
        Ok(TypeHistogram::from([
            ("ChatPanel".to_string(), 1),
            ("JButton".to_string(), 3),
        ]))
    }

    async fn inspect(&self, target: InspectTarget) -> Result<String, SurfaceError> {
        Ok(format!("{}: ScriptedControl", target))
    }
}

/// Bridge config with near-zero worker timings and a short grace period.
pub fn fast_config(root: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.worker.start_timeout_ms = 1_000;
    config.worker.finish_timeout_ms = 1_000;
    config.worker.poll_interval_ms = 5;
    config.worker.settle_ms = 0;
    config.server.shutdown_grace_ms = 50;
    config.server.await_termination_ms = 1_000;
    config.registry.path = Some(root.join("registry.json"));
    config
}

/// State for a target directory `<tmp>/target` on a made-up port.
pub fn test_state(surface: Arc<dyn ChatSurface>) -> (TempDir, Arc<BridgeState>) {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("target");
    std::fs::create_dir_all(&target).unwrap();

    let config = fast_config(dir.path());
    let registry = InstanceRegistry::from_config(&config.registry);
    let state = BridgeState::new(config, target, "instance-1".to_string(), 4100, surface, registry).unwrap();
    (dir, Arc::new(state))
}
