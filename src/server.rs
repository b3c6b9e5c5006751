//! Foreground bridge runner.

use std::path::PathBuf;
use std::sync::Arc;

use autobridge_api::BridgeServer;
use autobridge_config::BridgeConfig;
use autobridge_surface::{DedicatedUiThread, DetachedSurface, IntrospectedChat, UiContext};
use tracing::{info, warn};

/// Run a bridge for `target` until Ctrl+C or a `shutdown` request.
pub(crate) async fn run_bridge(
    config: BridgeConfig,
    target: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting AutoBridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Target directory: {}", target.display());

    let ui = Arc::new(DedicatedUiThread::spawn("autobridge-ui")?);
    let chat = IntrospectedChat::new(
        UiContext::new(ui.clone()),
        Arc::new(DetachedSurface),
        config.surface.clone(),
    );

    let server = BridgeServer::start(config, target, Arc::new(chat)).await?;
    info!("Bridge ready on port {}", server.port());

    let shutdown = server.state().shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                shutdown.cancel();
            }
            Err(e) => warn!("Could not listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;
    ui.shutdown();
    info!("AutoBridge stopped");
    Ok(())
}
