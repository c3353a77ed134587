use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::retry::RetryPolicy;
use crate::domain::DomainError;

/// Strategy selection and deduplication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a completed outcome is replayed to identical requests
    #[serde(default = "default_replay_window_ms")]
    pub replay_window_ms: u64,
    /// Window in which a repeated sheddable request may be skipped
    #[serde(default = "default_skip_window_ms")]
    pub skip_window_ms: u64,
    /// Sheddable requests at this priority value or lower urgency may be skipped
    #[serde(default = "default_skip_priority_threshold")]
    pub skip_priority_threshold: u8,
    /// Requests with a priority value above this are batched; the rest run immediately
    #[serde(default = "default_batch_priority_cutoff")]
    pub batch_priority_cutoff: u8,
    /// Capacity of the replay and skip tables
    #[serde(default = "default_max_tracked_requests")]
    pub max_tracked_requests: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_replay_window_ms() -> u64 {
    300_000
}

fn default_skip_window_ms() -> u64 {
    30_000
}

fn default_skip_priority_threshold() -> u8 {
    7
}

fn default_batch_priority_cutoff() -> u8 {
    2
}

fn default_max_tracked_requests() -> usize {
    10_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            replay_window_ms: default_replay_window_ms(),
            skip_window_ms: default_skip_window_ms(),
            skip_priority_threshold: default_skip_priority_threshold(),
            batch_priority_cutoff: default_batch_priority_cutoff(),
            max_tracked_requests: default_max_tracked_requests(),
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_replay_window(mut self, window: Duration) -> Self {
        self.replay_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_skip_window(mut self, window: Duration) -> Self {
        self.skip_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_batch_priority_cutoff(mut self, cutoff: u8) -> Self {
        self.batch_priority_cutoff = cutoff;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn replay_window(&self) -> Duration {
        Duration::from_millis(self.replay_window_ms)
    }

    pub fn skip_window(&self) -> Duration {
        Duration::from_millis(self.skip_window_ms)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(1..=10).contains(&self.skip_priority_threshold) {
            return Err(DomainError::configuration(
                "orchestrator.skip_priority_threshold must be between 1 and 10",
            ));
        }
        if self.batch_priority_cutoff > 10 {
            return Err(DomainError::configuration(
                "orchestrator.batch_priority_cutoff must be at most 10",
            ));
        }
        Ok(())
    }
}
