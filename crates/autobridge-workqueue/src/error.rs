//! Queue errors.

use autobridge_surface::SurfaceError;
use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue is full.
    #[error("Queue is full")]
    QueueFull,

    /// The bridge stopped accepting or running prompts.
    #[error("bridge is shutting down")]
    ShuttingDown,

    /// Prompt was empty or blank.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// The surface does not expose a control the task needs.
    #[error("chat surface does not expose {0}")]
    NotExposed(String),

    #[error("timed out waiting for generation to start")]
    StartTimeout,

    #[error("timed out waiting for generation to finish")]
    FinishTimeout,

    /// Generation finished but no response text could be read.
    #[error("no response text found")]
    NoResponse,

    /// Touching the surface failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// Worker error.
    #[error("Worker error: {0}")]
    WorkerError(String),
}
