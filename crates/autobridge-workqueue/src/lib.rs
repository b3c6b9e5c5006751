//! # AutoBridge Work Queue
//!
//! Serialized prompt execution against the chat surface.
//!
//! ## Features
//!
//! - Strict FIFO prompt queue
//! - Poll-synchronization engine on its own timer thread
//! - One dedicated worker thread owning every surface interaction
//! - Exactly one result delivered per accepted prompt

pub mod config;
pub mod error;
pub mod poll;
pub mod queue;
pub mod task;
pub mod worker;

pub use config::WorkerTimings;
pub use error::QueueError;
pub use poll::PollEngine;
pub use queue::TaskQueue;
pub use task::{ResultSink, Task, TaskInfo, TaskOutcome, TaskResult, TaskStatus};
pub use worker::{Worker, WorkerHandle, WorkerStats};
