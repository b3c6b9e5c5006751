//! FIFO prompt queue.

use std::collections::VecDeque;

use tokio::sync::{Notify, RwLock};
use tracing::{debug, info};

use crate::error::QueueError;
use crate::task::{Task, TaskInfo};

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// Strict first-in first-out task queue.
///
/// The lock covers only the queue's own mutation; no caller ever waits on it
/// for longer than a push or pop.
pub struct TaskQueue {
    max_size: usize,
    state: RwLock<QueueState>,
    wakeup: Notify,
}

impl TaskQueue {
    /// Create a queue; `max_size` of 0 means unbounded.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: RwLock::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            wakeup: Notify::new(),
        }
    }

    /// Append a task to the tail.
    ///
    /// Returns the task's 1-based position among pending tasks. On error the
    /// task is handed back so the caller can still deliver its result.
    pub async fn enqueue(&self, task: Task) -> Result<usize, (Task, QueueError)> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err((task, QueueError::ShuttingDown));
        }
        if self.max_size > 0 && state.tasks.len() >= self.max_size {
            return Err((task, QueueError::QueueFull));
        }

        let was_empty = state.tasks.is_empty();
        debug!("Enqueueing task: {}", task.id);
        state.tasks.push_back(task);
        let position = state.tasks.len();
        drop(state);

        if was_empty {
            self.wakeup.notify_one();
        }
        Ok(position)
    }

    /// Pop the head task.
    pub async fn dequeue(&self) -> Option<Task> {
        let task = self.state.write().await.tasks.pop_front();
        if let Some(ref task) = task {
            debug!("Dequeued task: {}", task.id);
        }
        task
    }

    /// Wait until an enqueue into an empty queue happens.
    ///
    /// A wakeup issued while nobody waits is kept for the next waiter.
    pub async fn notified(&self) {
        self.wakeup.notified().await;
    }

    /// Get queue length.
    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    /// Check if queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.tasks.is_empty()
    }

    /// Snapshots of pending tasks, head first.
    pub async fn snapshot(&self) -> Vec<TaskInfo> {
        self.state.read().await.tasks.iter().map(Task::info).collect()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Refuse further tasks and take everything still pending.
    pub async fn close(&self) -> Vec<Task> {
        let mut state = self.state.write().await;
        state.closed = true;
        let drained: Vec<Task> = state.tasks.drain(..).collect();
        if !drained.is_empty() {
            info!("Queue closed with {} pending tasks", drained.len());
        }
        drained
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
