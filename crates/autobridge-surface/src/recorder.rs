//! Event recording over a [`ChatSurface`].
//!
//! [`RecordingSurface`] forwards every call to the wrapped surface. While a
//! recording is active it also keeps one line per call, so a client can see
//! what the bridge did to the chat panel and what the panel answered. Polled
//! reads (`is_generating`, `response_count`) are only recorded when their
//! value changes.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::chat::{ChatMode, ChatSurface, InspectTarget};
use crate::error::SurfaceError;
use crate::search::TypeHistogram;

/// Events kept per recording; later ones are counted as dropped.
pub const MAX_RECORDED_EVENTS: usize = 5_000;

/// Prompt characters shown in a `submit_prompt` event.
const PROMPT_PREVIEW_CHARS: usize = 80;

/// Result of a finished recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedEvents {
    pub events: Vec<String>,
    /// Events past [`MAX_RECORDED_EVENTS`].
    pub dropped: usize,
}

struct Recording {
    started: Instant,
    captured: RecordedEvents,
    generating: Option<bool>,
    responses: Option<usize>,
}

impl Recording {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            captured: RecordedEvents::default(),
            generating: None,
            responses: None,
        }
    }

    fn push(&mut self, line: String) {
        if self.captured.events.len() >= MAX_RECORDED_EVENTS {
            self.captured.dropped += 1;
            return;
        }
        let elapsed = self.started.elapsed().as_millis();
        self.captured.events.push(format!("+{}ms {}", elapsed, line));
    }
}

/// A [`ChatSurface`] that can record the calls made through it.
pub struct RecordingSurface {
    inner: Arc<dyn ChatSurface>,
    recording: Mutex<Option<Recording>>,
}

impl RecordingSurface {
    pub fn new(inner: Arc<dyn ChatSurface>) -> Self {
        Self {
            inner,
            recording: Mutex::new(None),
        }
    }

    /// Start recording, discarding any recording in progress.
    ///
    /// Returns `true` if one was discarded.
    pub fn start(&self) -> bool {
        let discarded = self.recording.lock().replace(Recording::new()).is_some();
        info!("Event recording started");
        discarded
    }

    /// Stop recording and hand back what was captured.
    ///
    /// `None` when no recording is active.
    pub fn stop(&self) -> Option<RecordedEvents> {
        let recording = self.recording.lock().take()?;
        info!(
            "Event recording stopped with {} events",
            recording.captured.events.len()
        );
        Some(recording.captured)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.lock().is_some()
    }

    fn record(&self, call: impl FnOnce() -> String, outcome: impl FnOnce() -> String) {
        if let Some(recording) = self.recording.lock().as_mut() {
            let line = format!("{} -> {}", call(), outcome());
            debug!("Recorded {}", line);
            recording.push(line);
        }
    }
}

fn outcome<T: Debug>(result: &Result<T, SurfaceError>) -> String {
    outcome_with(result, |value| format!("{:?}", value))
}

fn outcome_with<T>(result: &Result<T, SurfaceError>, show: impl FnOnce(&T) -> String) -> String {
    match result {
        Ok(value) => show(value),
        Err(e) => format!("error: {}", e),
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{:?}...", head)
    } else {
        format!("{:?}", head)
    }
}

#[async_trait]
impl ChatSurface for RecordingSurface {
    async fn submit_prompt(&self, prompt: &str) -> Result<bool, SurfaceError> {
        let result = self.inner.submit_prompt(prompt).await;
        self.record(|| format!("submit_prompt({})", preview(prompt)), || outcome(&result));
        result
    }

    async fn is_generating(&self) -> Result<bool, SurfaceError> {
        let result = self.inner.is_generating().await;
        if let Some(recording) = self.recording.lock().as_mut() {
            match &result {
                Ok(generating) if recording.generating == Some(*generating) => {}
                Ok(generating) => {
                    recording.generating = Some(*generating);
                    recording.push(format!("is_generating -> {}", generating));
                }
                Err(e) => recording.push(format!("is_generating -> error: {}", e)),
            }
        }
        result
    }

    async fn response_count(&self) -> Result<usize, SurfaceError> {
        let result = self.inner.response_count().await;
        if let Some(recording) = self.recording.lock().as_mut() {
            match &result {
                Ok(count) if recording.responses == Some(*count) => {}
                Ok(count) => {
                    recording.responses = Some(*count);
                    recording.push(format!("response_count -> {}", count));
                }
                Err(e) => recording.push(format!("response_count -> error: {}", e)),
            }
        }
        result
    }

    async fn latest_response(&self) -> Result<Option<String>, SurfaceError> {
        let result = self.inner.latest_response().await;
        self.record(
            || "latest_response".to_string(),
            || {
                outcome_with(&result, |response| match response {
                    Some(text) => preview(text),
                    None => "none".to_string(),
                })
            },
        );
        result
    }

    async fn set_chat_mode(&self, mode: ChatMode) -> Result<bool, SurfaceError> {
        let result = self.inner.set_chat_mode(mode).await;
        self.record(|| format!("set_chat_mode({})", mode), || outcome(&result));
        result
    }

    async fn select_model(&self, label: &str) -> Result<bool, SurfaceError> {
        let result = self.inner.select_model(label).await;
        self.record(|| format!("select_model({:?})", label), || outcome(&result));
        result
    }

    async fn new_session(&self) -> Result<bool, SurfaceError> {
        let result = self.inner.new_session().await;
        self.record(|| "new_session".to_string(), || outcome(&result));
        result
    }

    async fn diagnose(&self) -> Result<TypeHistogram, SurfaceError> {
        let result = self.inner.diagnose().await;
        self.record(
            || "diagnose".to_string(),
            || outcome_with(&result, |histogram| format!("{} types", histogram.len())),
        );
        result
    }

    async fn inspect(&self, target: InspectTarget) -> Result<String, SurfaceError> {
        let result = self.inner.inspect(target).await;
        self.record(
            || format!("inspect({})", target),
            || outcome_with(&result, |report| format!("{} chars", report.len())),
        );
        result
    }
}
