//! Prompt task definition and status.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting in queue.
    Queued,
    /// Being driven by the worker.
    Running,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Queued
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed { content: String },
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Completed { .. } => TaskStatus::Completed,
            TaskOutcome::Failed { .. } => TaskStatus::Failed,
        }
    }
}

/// Terminal message for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub prompt: String,
    pub outcome: TaskOutcome,
}

/// Where a task's single result goes.
pub trait ResultSink: Send + Sync {
    fn deliver(&self, result: TaskResult);
}

impl ResultSink for mpsc::UnboundedSender<TaskResult> {
    fn deliver(&self, result: TaskResult) {
        // The receiving connection may be gone already.
        let _ = self.send(result);
    }
}

/// Serializable snapshot of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub id: Uuid,
    pub prompt: String,
    /// Connection that submitted the prompt.
    pub origin: String,
    pub status: TaskStatus,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// A prompt waiting for, or undergoing, execution.
///
/// Delivering the result consumes the task, so a task can never report twice.
pub struct Task {
    pub id: Uuid,
    pub prompt: String,
    pub origin: String,
    pub status: TaskStatus,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    sink: Arc<dyn ResultSink>,
}

impl Task {
    /// Create a new task.
    pub fn new(prompt: impl Into<String>, origin: impl Into<String>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            origin: origin.into(),
            status: TaskStatus::Queued,
            enqueued_at: Utc::now(),
            started_at: None,
            sink,
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            prompt: self.prompt.clone(),
            origin: self.origin.clone(),
            status: self.status,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
        }
    }

    /// Mark the task as running.
    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Deliver the task's one result and consume it.
    pub fn finish(mut self, outcome: TaskOutcome) -> TaskInfo {
        self.status = outcome.status();
        let info = self.info();
        self.sink.deliver(TaskResult {
            task_id: self.id,
            prompt: self.prompt,
            outcome,
        });
        info
    }

    /// Deliver a failure and consume the task.
    pub fn fail(self, reason: impl fmt::Display) -> TaskInfo {
        self.finish(TaskOutcome::Failed {
            reason: reason.to_string(),
        })
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("prompt", &self.prompt)
            .field("origin", &self.origin)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
