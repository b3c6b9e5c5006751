//! The single prompt worker.
//!
//! Exactly one worker exists per bridge instance. It runs on its own thread
//! and is the only code that drives the chat surface through a full prompt
//! cycle: submit, wait for generation to start, wait for it to finish, read
//! the response.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use autobridge_surface::ChatSurface;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WorkerTimings;
use crate::error::QueueError;
use crate::poll::PollEngine;
use crate::queue::TaskQueue;
use crate::task::{Task, TaskInfo, TaskOutcome};

/// Counters reported by a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct WorkerShared {
    current: RwLock<Option<TaskInfo>>,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
}

/// Drives queued prompts through the chat surface, one at a time.
pub struct Worker {
    queue: Arc<TaskQueue>,
    surface: Arc<dyn ChatSurface>,
    poll: Arc<PollEngine>,
    timings: WorkerTimings,
    /// Held for a task's whole drive, poll and extract sequence.
    surface_lock: tokio::sync::Mutex<()>,
    shared: Arc<WorkerShared>,
}

impl Worker {
    /// Create a new worker.
    pub fn new(
        queue: Arc<TaskQueue>,
        surface: Arc<dyn ChatSurface>,
        poll: Arc<PollEngine>,
        timings: WorkerTimings,
    ) -> Self {
        Self {
            queue,
            surface,
            poll,
            timings,
            surface_lock: tokio::sync::Mutex::new(()),
            shared: Arc::new(WorkerShared::default()),
        }
    }

    /// Start the worker on a dedicated thread.
    pub fn spawn(self) -> Result<WorkerHandle, QueueError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| QueueError::WorkerError(format!("worker runtime: {}", e)))?;

        let shutdown = CancellationToken::new();
        let force = CancellationToken::new();
        let shared = self.shared.clone();

        let thread = {
            let shutdown = shutdown.clone();
            let force = force.clone();
            std::thread::Builder::new()
                .name("autobridge-worker".to_string())
                .spawn(move || runtime.block_on(self.run(shutdown, force)))
                .map_err(|e| QueueError::WorkerError(format!("worker thread: {}", e)))?
        };

        Ok(WorkerHandle {
            shared,
            shutdown,
            force,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Process tasks until `shutdown` fires, then fail whatever is still queued.
    ///
    /// `force` aborts the task in flight.
    pub async fn run(&self, shutdown: CancellationToken, force: CancellationToken) {
        info!("Worker started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            match self.queue.dequeue().await {
                Some(task) => self.process(task, &force).await,
                None => {
                    tokio::select! {
                        _ = self.queue.notified() => {}
                        _ = shutdown.cancelled() => break,
                    }
                }
            }
        }

        for task in self.queue.close().await {
            debug!("Failing queued task {} on shutdown", task.id);
            task.fail(QueueError::ShuttingDown);
        }
        info!("Worker stopped");
    }

    async fn process(&self, mut task: Task, force: &CancellationToken) {
        task.start();
        *self.shared.current.write() = Some(task.info());
        info!("Running task {}", task.id);

        let outcome = tokio::select! {
            biased;
            _ = force.cancelled() => Err(QueueError::ShuttingDown),
            result = AssertUnwindSafe(self.drive(&task.prompt)).catch_unwind() => {
                result.unwrap_or_else(|_| Err(QueueError::WorkerError("task panicked".to_string())))
            }
        };

        *self.shared.current.write() = None;
        match outcome {
            Ok(content) => {
                self.shared.tasks_completed.fetch_add(1, Ordering::SeqCst);
                info!("Task {} completed ({} chars)", task.id, content.len());
                task.finish(TaskOutcome::Completed { content });
            }
            Err(e) => {
                self.shared.tasks_failed.fetch_add(1, Ordering::SeqCst);
                error!("Task {} failed: {}", task.id, e);
                task.fail(e);
            }
        }
    }

    async fn drive(&self, prompt: &str) -> Result<String, QueueError> {
        if prompt.trim().is_empty() {
            return Err(QueueError::EmptyPrompt);
        }

        let _guard = self.surface_lock.lock().await;
        let baseline = self.surface.response_count().await?;

        if !self.surface.submit_prompt(prompt).await? {
            return Err(QueueError::NotExposed("a prompt input".to_string()));
        }

        let surface = self.surface.clone();
        let started = self
            .poll
            .poll_until(self.timings.start_timeout, self.timings.poll_interval, move || {
                let surface = surface.clone();
                async move {
                    // A generation short enough to end between two ticks
                    // still leaves a new response behind.
                    Ok::<_, QueueError>(
                        surface.is_generating().await? || surface.response_count().await? > baseline,
                    )
                }
            })
            .await;
        if !started {
            return Err(QueueError::StartTimeout);
        }
        debug!("Generation started");

        let surface = self.surface.clone();
        let finished = self
            .poll
            .poll_until(self.timings.finish_timeout, self.timings.poll_interval, move || {
                let surface = surface.clone();
                async move { surface.is_generating().await.map(|generating| !generating) }
            })
            .await;
        if !finished {
            return Err(QueueError::FinishTimeout);
        }
        debug!("Generation finished");

        if !self.timings.settle.is_zero() {
            self.poll.delay(self.timings.settle).await;
        }

        self.surface
            .latest_response()
            .await?
            .ok_or(QueueError::NoResponse)
    }
}

/// Owner-side handle of a running [`Worker`].
pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
    shutdown: CancellationToken,
    force: CancellationToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Task currently being driven.
    pub fn current(&self) -> Option<TaskInfo> {
        self.shared.current.read().clone()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            completed: self.shared.tasks_completed.load(Ordering::SeqCst),
            failed: self.shared.tasks_failed.load(Ordering::SeqCst),
        }
    }

    /// Whether the worker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the worker.
    ///
    /// The task in flight gets `await_window` to finish; after that it is
    /// interrupted and fails. Returns `true` if the worker stopped within the
    /// window.
    pub async fn shutdown(&self, await_window: Duration) -> bool {
        self.shutdown.cancel();
        let Some(thread) = self.thread.lock().take() else {
            return true;
        };

        let mut joiner = tokio::task::spawn_blocking(move || thread.join().is_ok());
        match tokio::time::timeout(await_window, &mut joiner).await {
            Ok(_) => {
                info!("Worker shut down");
                true
            }
            Err(_) => {
                warn!("Worker still busy after {:?}; interrupting current task", await_window);
                self.force.cancel();
                let _ = joiner.await;
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
