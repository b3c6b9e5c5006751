//! Poll-synchronization engine.
//!
//! Ticks are scheduled on a timer runtime of their own, so a worker stalled in
//! [`PollEngine::poll_until`] never delays connection handling, and the
//! acceptor's load never delays a tick.

use std::fmt::Display;
use std::future::Future;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::QueueError;

/// Repeatedly evaluates a condition until it holds or a deadline passes.
pub struct PollEngine {
    handle: Handle,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PollEngine {
    /// Start a dedicated timer thread.
    pub fn start() -> Result<Self, QueueError> {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| QueueError::WorkerError(format!("poll runtime: {}", e)))?;
        let handle = runtime.handle().clone();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("autobridge-poll".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
                debug!("Poll engine stopped");
            })
            .map_err(|e| QueueError::WorkerError(format!("poll thread: {}", e)))?;

        info!("Poll engine started");
        Ok(Self {
            handle,
            stop: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Schedule ticks on an existing runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            stop: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    /// Wait `delay` on the timer runtime.
    ///
    /// Returns `false` if the engine is no longer running.
    pub async fn delay(&self, delay: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });
        rx.await.is_ok()
    }

    /// Evaluate `predicate` immediately, then every `interval`, until it
    /// returns `Ok(true)` or `timeout` has elapsed.
    ///
    /// A predicate error counts as "not yet". The final evaluation happens
    /// at or after the deadline, never before it.
    pub async fn poll_until<F, Fut, E>(&self, timeout: Duration, interval: Duration, mut predicate: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let started = Instant::now();
        loop {
            match predicate().await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("Poll predicate failed: {}", e),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return false;
            }
            if !self.delay(interval.min(timeout - elapsed)).await {
                warn!("Poll engine gone while polling");
                return false;
            }
        }
    }

    /// Stop the timer thread. Pending ticks are abandoned.
    pub fn shutdown(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Poll thread terminated abnormally");
            }
        }
    }
}

impl Drop for PollEngine {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
    }
}
