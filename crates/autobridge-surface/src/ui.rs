//! UI confinement context.
//!
//! Every read or write of the target surface runs on a single context owned
//! by the host. Async callers hand closures over and await the result.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SurfaceError;

/// Unit of work executed on the UI context.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs on the surface's confinement context.
pub trait UiDispatch: Send + Sync {
    /// Queue a job. Jobs run one at a time in submission order.
    fn dispatch(&self, job: UiJob) -> Result<(), SurfaceError>;
}

/// Runs jobs immediately on the calling thread.
///
/// Only suitable for surfaces that tolerate access from any thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatch;

impl UiDispatch for InlineDispatch {
    fn dispatch(&self, job: UiJob) -> Result<(), SurfaceError> {
        job();
        Ok(())
    }
}

/// A named OS thread draining a job channel.
pub struct DedicatedUiThread {
    sender: Mutex<Option<mpsc::Sender<UiJob>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DedicatedUiThread {
    pub fn spawn(name: impl Into<String>) -> Result<Self, SurfaceError> {
        let (sender, receiver) = mpsc::channel::<UiJob>();
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                for job in receiver {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                        warn!("UI job panicked: {}", panic_message(payload.as_ref()));
                    }
                }
                debug!("UI thread exiting");
            })
            .map_err(|e| SurfaceError::Unavailable(format!("cannot start UI thread: {}", e)))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("UI thread terminated abnormally");
            }
        }
    }
}

impl UiDispatch for DedicatedUiThread {
    fn dispatch(&self, job: UiJob) -> Result<(), SurfaceError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(SurfaceError::ContextClosed)?;
        sender.send(job).map_err(|_| SurfaceError::ContextClosed)
    }
}

impl Drop for DedicatedUiThread {
    fn drop(&mut self) {
        self.sender.lock().take();
    }
}

/// Async handle onto a [`UiDispatch`].
#[derive(Clone)]
pub struct UiContext {
    dispatcher: Arc<dyn UiDispatch>,
}

impl UiContext {
    pub fn new(dispatcher: Arc<dyn UiDispatch>) -> Self {
        Self { dispatcher }
    }

    /// Run `f` on the UI context and wait for its result.
    ///
    /// A panic inside `f` is reported as [`SurfaceError::Panicked`]; the
    /// context itself keeps running.
    pub async fn run<R, F>(&self, f: F) -> Result<R, SurfaceError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatcher.dispatch(Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| SurfaceError::Panicked(panic_message(payload.as_ref())));
            let _ = tx.send(outcome);
        }))?;

        rx.await.map_err(|_| SurfaceError::ContextClosed)?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
