//! Worker timing.

use std::time::Duration;

use autobridge_config::WorkerConfig;

/// [`WorkerConfig`] resolved into durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTimings {
    pub start_timeout: Duration,
    pub finish_timeout: Duration,
    pub poll_interval: Duration,
    pub settle: Duration,
}

impl From<&WorkerConfig> for WorkerTimings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            start_timeout: Duration::from_millis(config.start_timeout_ms),
            finish_timeout: Duration::from_millis(config.finish_timeout_ms),
            // A zero interval would spin the poll loop.
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            settle: Duration::from_millis(config.settle_ms),
        }
    }
}

impl Default for WorkerTimings {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}
