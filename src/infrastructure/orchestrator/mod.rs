//! Request orchestrator - deduplication, strategy selection, caching and batching

mod config;
mod dedup;
mod retry;
mod service;

pub use self::config::OrchestratorConfig;
pub use retry::RetryPolicy;
pub use service::{Orchestrator, OrchestratorStats};
