//! Bridge server: port negotiation, registration, heartbeat and teardown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use autobridge_config::{AgentDescriptor, BridgeConfig, ServerConfig};
use autobridge_registry::{InstanceRegistry, RegistryError};
use autobridge_surface::ChatSurface;
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::state::{BridgeState, descriptor_or_default, instance_record, off_runtime};
use crate::websocket::ws_handler;

/// A bound, registered bridge instance.
pub struct BridgeServer {
    state: Arc<BridgeState>,
    listener: TcpListener,
}

impl BridgeServer {
    /// Negotiate a port, register the instance and start the worker.
    pub async fn start(
        config: BridgeConfig,
        target: PathBuf,
        surface: Arc<dyn ChatSurface>,
    ) -> Result<Self, BridgeError> {
        let registry = InstanceRegistry::from_config(&config.registry);
        if let Err(e) = off_runtime(&registry, |registry| registry.cleanup_stale_entries()).await {
            warn!("Could not clean registry {}: {}", registry.path().display(), e);
        }

        let descriptor = descriptor_or_default(&target);
        let instance_id = descriptor
            .instance_id
            .clone()
            .unwrap_or_else(InstanceRegistry::generate_instance_id);
        let preferred = {
            let server = config.server.clone();
            let descriptor = descriptor.clone();
            let id = instance_id.clone();
            off_runtime(&registry, move |registry| {
                Ok(preferred_port(&server, &descriptor, registry, &id))
            })
            .await?
        };

        let (listener, port) = negotiate_port(
            &config.server,
            &registry,
            &instance_id,
            &target,
            &descriptor,
            preferred,
        )
        .await?;

        let state = match BridgeState::new(config, target, instance_id.clone(), port, surface, registry.clone()) {
            Ok(state) => Arc::new(state),
            Err(e) => {
                let id = instance_id.clone();
                let _ = off_runtime(&registry, move |registry| registry.remove_instance(&id)).await;
                return Err(e);
            }
        };

        info!(
            "Bridge instance {} ({}) bound to port {}",
            instance_id, descriptor.agent_name, port
        );
        Ok(Self { state, listener })
    }

    pub fn port(&self) -> u16 {
        self.state.port
    }

    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// WebSocket routes; clients may connect at `/` or `/ws`.
    pub fn router(state: Arc<BridgeState>) -> Router {
        Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
    }

    /// Serve until shutdown, then tear everything down.
    ///
    /// Teardown stops the acceptor, gives the worker the await-termination
    /// window before interrupting it, stops the poll engine, closes open
    /// sessions and releases the registry entry.
    pub async fn run(self) -> Result<(), BridgeError> {
        let Self { state, listener } = self;
        let app = Self::router(state.clone());
        let shutdown = state.shutdown_token();
        info!(
            "Bridge listening on ws://{}:{}",
            state.config.server.host, state.port
        );

        let mut acceptor: JoinHandle<std::io::Result<()>> = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
            })
        };
        let heartbeat = spawn_heartbeat(state.clone());

        let mut acceptor_done = false;
        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = &mut acceptor => {
                acceptor_done = true;
                match result {
                    Ok(Ok(())) => warn!("Acceptor stopped unexpectedly"),
                    Ok(Err(e)) => error!("Server error: {}", e),
                    Err(e) => error!("Acceptor task failed: {}", e),
                }
                shutdown.cancel();
            }
        }

        info!("Tearing down bridge on port {}", state.port);
        heartbeat.abort();

        let window = Duration::from_millis(state.config.server.await_termination_ms);
        if !state.worker.shutdown(window).await {
            warn!("Worker interrupted after {:?}", window);
        }
        state.poll.shutdown();
        state.close_sessions();

        if !acceptor_done && tokio::time::timeout(window, acceptor).await.is_err() {
            warn!("Acceptor did not stop within {:?}", window);
        }

        let id = state.instance_id.clone();
        match off_runtime(&state.registry, move |registry| registry.remove_instance(&id)).await {
            Ok(_) => info!("Bridge instance {} stopped", state.instance_id),
            Err(e) => warn!("Could not release registry entry {}: {}", state.instance_id, e),
        }
        Ok(())
    }
}

/// First port to try: configured, then descriptor, then last registered.
fn preferred_port(
    server: &ServerConfig,
    descriptor: &AgentDescriptor,
    registry: &InstanceRegistry,
    instance_id: &str,
) -> Option<u16> {
    if server.port != 0 {
        return Some(server.port);
    }
    if descriptor.port != 0 {
        return Some(descriptor.port);
    }
    match registry.get_port(instance_id) {
        Ok(port) => port.filter(|p| *p != 0),
        Err(e) => {
            warn!("Could not read previous port for {}: {}", instance_id, e);
            None
        }
    }
}

/// Bind and register a port.
///
/// After any conflict only OS-assigned ports are tried, each re-checked
/// against live registry records.
async fn negotiate_port(
    server: &ServerConfig,
    registry: &InstanceRegistry,
    instance_id: &str,
    target: &std::path::Path,
    descriptor: &AgentDescriptor,
    preferred: Option<u16>,
) -> Result<(TcpListener, u16), BridgeError> {
    let attempts = server.bind_attempts.max(1);
    let mut candidate = preferred.unwrap_or(0);

    for attempt in 1..=attempts {
        if candidate != 0 {
            let id = instance_id.to_string();
            let claimed = off_runtime(registry, move |registry| registry.is_port_claimed(candidate, &id)).await?;
            if claimed {
                warn!("Port {} is held by another live instance", candidate);
                candidate = 0;
                continue;
            }
        }

        let listener = match TcpListener::bind((server.host.as_str(), candidate)).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!(
                    "Bind attempt {}/{} on {}:{} failed: {}",
                    attempt, attempts, server.host, candidate, e
                );
                candidate = 0;
                continue;
            }
        };

        let port = listener.local_addr()?.port();
        let id = instance_id.to_string();
        let record = instance_record(port, target, descriptor);
        match off_runtime(registry, move |registry| registry.register_instance(&id, record)).await {
            Ok(()) => return Ok((listener, port)),
            Err(RegistryError::PortInUse { port, owner }) => {
                warn!("Port {} was registered by {} meanwhile", port, owner);
                candidate = 0;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(BridgeError::BindExhausted { attempts })
}

fn spawn_heartbeat(state: Arc<BridgeState>) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.registry.heartbeat_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let beat = state.clone();
            match tokio::task::spawn_blocking(move || heartbeat(&beat)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Heartbeat failed: {}", e),
                Err(e) => warn!("Heartbeat task failed: {}", e),
            }
        }
    })
}

/// Refresh this instance's record and drop stale ones.
pub(crate) fn heartbeat(state: &BridgeState) -> Result<(), RegistryError> {
    if !state.registry.touch(&state.instance_id)? {
        warn!(
            "Registry entry for {} disappeared; registering again",
            state.instance_id
        );
        state.registry.register_instance(&state.instance_id, state.record())?;
    }

    let removed = state.registry.cleanup_stale_entries()?;
    if !removed.is_empty() {
        debug!("Heartbeat dropped stale instances: {:?}", removed);
    }
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
