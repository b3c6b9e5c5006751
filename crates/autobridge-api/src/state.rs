//! Per-instance bridge state shared by every connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use autobridge_config::{AgentDescriptor, BridgeConfig, ConfigError};
use autobridge_registry::{InstanceRecord, InstanceRegistry, RegistryError};
use autobridge_sandbox::CommandSandbox;
use autobridge_surface::{ChatSurface, RecordingSurface};
use autobridge_workqueue::{PollEngine, TaskQueue, Worker, WorkerHandle, WorkerTimings};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::websocket::ConnectionManager;

/// Everything one bridge instance owns.
pub struct BridgeState {
    pub config: BridgeConfig,
    /// Directory of the automated target.
    pub target: PathBuf,
    pub instance_id: String,
    pub port: u16,
    pub queue: Arc<TaskQueue>,
    pub worker: WorkerHandle,
    pub poll: Arc<PollEngine>,
    /// The chat surface as every caller sees it, routed through `recorder`.
    pub surface: Arc<dyn ChatSurface>,
    pub recorder: Arc<RecordingSurface>,
    pub sandbox: CommandSandbox,
    pub registry: InstanceRegistry,
    pub connections: Arc<ConnectionManager>,
    /// Serializes read-modify-write of the descriptor file.
    descriptor_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    sessions_closed: CancellationToken,
    shutdown_requested: AtomicBool,
}

impl BridgeState {
    /// Build the state and start the worker.
    pub fn new(
        config: BridgeConfig,
        target: PathBuf,
        instance_id: String,
        port: u16,
        surface: Arc<dyn ChatSurface>,
        registry: InstanceRegistry,
    ) -> Result<Self, BridgeError> {
        let recorder = Arc::new(RecordingSurface::new(surface));
        let surface: Arc<dyn ChatSurface> = recorder.clone();
        let queue = Arc::new(TaskQueue::new(config.worker.max_queue_size));
        let poll = Arc::new(PollEngine::start()?);
        let worker = Worker::new(
            queue.clone(),
            surface.clone(),
            poll.clone(),
            WorkerTimings::from(&config.worker),
        )
        .spawn()?;
        let sandbox = CommandSandbox::new(&config.sandbox, &target);

        Ok(Self {
            config,
            target,
            instance_id,
            port,
            queue,
            worker,
            poll,
            surface,
            recorder,
            sandbox,
            registry,
            connections: Arc::new(ConnectionManager::new(port)),
            descriptor_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            sessions_closed: CancellationToken::new(),
            shutdown_requested: AtomicBool::new(false),
        })
    }

    /// Descriptor as currently on disk.
    pub fn descriptor(&self) -> Result<AgentDescriptor, ConfigError> {
        AgentDescriptor::load(&self.target)
    }

    /// This instance's registry record, seen now.
    pub fn record(&self) -> InstanceRecord {
        instance_record(self.port, &self.target, &descriptor_or_default(&self.target))
    }

    /// Apply `change` to the descriptor on disk and republish the registry record.
    ///
    /// A missing descriptor starts from the directory defaults; an unreadable
    /// one is left alone. The running instance id is written when the file
    /// has none, so the next start keeps the same identity.
    pub async fn update_descriptor<F>(&self, change: F) -> Result<AgentDescriptor, BridgeError>
    where
        F: FnOnce(&mut AgentDescriptor),
    {
        let _guard = self.descriptor_lock.lock().await;
        let mut descriptor = match AgentDescriptor::load(&self.target) {
            Ok(descriptor) => descriptor,
            Err(ConfigError::NotFound(_)) => AgentDescriptor::default_for(&self.target),
            Err(e) => return Err(e.into()),
        };
        if descriptor.instance_id.is_none() {
            descriptor.instance_id = Some(self.instance_id.clone());
        }
        change(&mut descriptor);
        descriptor.save(&self.target)?;

        let id = self.instance_id.clone();
        let record = instance_record(self.port, &self.target, &descriptor);
        off_runtime(&self.registry, move |registry| registry.register_instance(&id, record)).await?;
        info!("Descriptor for {} updated", self.instance_id);
        Ok(descriptor)
    }

    /// Token cancelled when teardown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Token cancelled once sessions should close their sockets.
    pub fn sessions_closed(&self) -> CancellationToken {
        self.sessions_closed.clone()
    }

    pub(crate) fn close_sessions(&self) {
        self.sessions_closed.cancel();
    }

    /// Begin teardown after the configured grace period.
    ///
    /// Returns `false` if a shutdown was already requested.
    pub fn request_shutdown(&self) -> bool {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return false;
        }

        let grace = Duration::from_millis(self.config.server.shutdown_grace_ms);
        info!("Shutdown requested; tearing down in {:?}", grace);
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            token.cancel();
        });
        true
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

/// Run a registry call on the blocking pool.
///
/// Registry calls take an exclusive file lock and do file I/O.
pub(crate) async fn off_runtime<T, F>(registry: &InstanceRegistry, call: F) -> Result<T, RegistryError>
where
    T: Send + 'static,
    F: FnOnce(&InstanceRegistry) -> Result<T, RegistryError> + Send + 'static,
{
    let registry = registry.clone();
    tokio::task::spawn_blocking(move || call(&registry))
        .await
        .map_err(|e| RegistryError::Io(std::io::Error::other(e)))?
}

/// Descriptor for `target`, or one derived from the directory name.
pub fn descriptor_or_default(target: &Path) -> AgentDescriptor {
    AgentDescriptor::load(target).unwrap_or_else(|e| {
        warn!("No usable agent descriptor in {}: {}", target.display(), e);
        AgentDescriptor::default_for(target)
    })
}

pub(crate) fn instance_record(port: u16, target: &Path, descriptor: &AgentDescriptor) -> InstanceRecord {
    InstanceRecord::new(
        port,
        target,
        descriptor.agent_name.clone(),
        descriptor.description.clone(),
    )
    .with_role(descriptor.role.clone())
    .with_capabilities(descriptor.capabilities.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{IdleSurface, test_state};

    #[tokio::test]
    async fn test_state_starts_worker() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));
        assert!(state.worker.is_running());
        assert_eq!(state.connections.port(), state.port);
        assert!(state.worker.shutdown(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn test_record_falls_back_to_directory_name() {
        let (dir, state) = test_state(Arc::new(IdleSurface));
        let record = state.record();
        assert_eq!(record.port, state.port);
        assert_eq!(record.project_path, dir.path().join("target"));
        assert_eq!(record.agent_name, "target");
    }

    #[tokio::test]
    async fn test_record_uses_descriptor() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));
        let mut descriptor = AgentDescriptor::default_for(&state.target);
        descriptor.agent_name = "reviewer".to_string();
        descriptor.role = Some("qa".to_string());
        descriptor.capabilities = vec!["review".to_string()];
        descriptor.save(&state.target).unwrap();

        let record = state.record();
        assert_eq!(record.agent_name, "reviewer");
        assert_eq!(record.role.as_deref(), Some("qa"));
        assert_eq!(record.capabilities, vec!["review"]);
    }

    #[tokio::test]
    async fn test_update_descriptor_creates_file_and_record() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));

        let descriptor = state
            .update_descriptor(|d| d.role = Some("coder".to_string()))
            .await
            .unwrap();
        assert_eq!(descriptor.agent_name, "target");
        assert_eq!(descriptor.instance_id.as_deref(), Some("instance-1"));

        let saved = state.descriptor().unwrap();
        assert_eq!(saved.role.as_deref(), Some("coder"));
        let record = state.registry.get("instance-1").unwrap().unwrap();
        assert_eq!(record.role.as_deref(), Some("coder"));
        assert_eq!(record.port, 4100);
    }

    #[tokio::test]
    async fn test_update_descriptor_keeps_other_fields() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));
        let mut descriptor = AgentDescriptor::default_for(&state.target);
        descriptor.agent_name = "reviewer".to_string();
        descriptor.instance_id = Some("pinned".to_string());
        descriptor.port = 4200;
        descriptor.save(&state.target).unwrap();

        state
            .update_descriptor(|d| d.capabilities = vec!["review".to_string()])
            .await
            .unwrap();

        let saved = state.descriptor().unwrap();
        assert_eq!(saved.agent_name, "reviewer");
        assert_eq!(saved.instance_id.as_deref(), Some("pinned"));
        assert_eq!(saved.port, 4200);
        assert_eq!(saved.capabilities, vec!["review"]);
    }

    #[tokio::test]
    async fn test_update_descriptor_leaves_unreadable_file() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));
        let path = AgentDescriptor::path_for(&state.target);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{broken").unwrap();

        let err = state.update_descriptor(|d| d.role = None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{broken");
        assert_eq!(state.registry.get("instance-1").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shutdown_waits_for_grace() {
        let (_dir, state) = test_state(Arc::new(IdleSurface));
        let token = state.shutdown_token();

        assert!(state.request_shutdown());
        assert!(!state.request_shutdown());
        assert!(state.is_shutdown_requested());
        assert!(!token.is_cancelled());

        tokio::time::sleep(Duration::from_millis(state.config.server.shutdown_grace_ms + 10)).await;
        assert!(token.is_cancelled());
    }
}
