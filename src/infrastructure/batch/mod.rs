//! Adaptive batching of model calls per operation type

mod config;
mod scheduler;

pub use self::config::BatchSchedulerConfig;
pub use scheduler::{BatchQueueStats, BatchScheduler};
