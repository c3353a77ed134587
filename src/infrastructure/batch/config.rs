use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Batch scheduler tuning, shared by every operation queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSchedulerConfig {
    /// Workers draining each operation queue
    #[serde(default = "default_workers")]
    pub workers_per_operation: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Collection window measured from the first item of a batch
    #[serde(default = "default_collection_timeout_ms")]
    pub collection_timeout_ms: u64,
    /// How long unclaimed results are kept
    #[serde(default = "default_result_retention_ms")]
    pub result_retention_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bounded join on shutdown before workers are aborted
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_workers() -> usize {
    1
}

fn default_max_batch_size() -> usize {
    20
}

fn default_collection_timeout_ms() -> u64 {
    50
}

fn default_result_retention_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    5
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl Default for BatchSchedulerConfig {
    fn default() -> Self {
        Self {
            workers_per_operation: default_workers(),
            max_batch_size: default_max_batch_size(),
            collection_timeout_ms: default_collection_timeout_ms(),
            result_retention_ms: default_result_retention_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl BatchSchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers_per_operation = workers;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_collection_timeout(mut self, timeout: Duration) -> Self {
        self.collection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_result_retention(mut self, retention: Duration) -> Self {
        self.result_retention_ms = retention.as_millis() as u64;
        self
    }

    pub fn collection_timeout(&self) -> Duration {
        Duration::from_millis(self.collection_timeout_ms)
    }

    pub fn result_retention(&self) -> Duration {
        Duration::from_millis(self.result_retention_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.workers_per_operation == 0 {
            return Err(DomainError::configuration(
                "batch.workers_per_operation must be at least 1",
            ));
        }
        if self.max_batch_size == 0 {
            return Err(DomainError::configuration(
                "batch.max_batch_size must be at least 1",
            ));
        }
        Ok(())
    }
}
