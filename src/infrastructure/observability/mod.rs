//! Observability infrastructure - Tracing, Metrics, and Logging

mod config;
mod metrics;
mod tracing_setup;

pub use self::config::{MetricsConfig, ObservabilityConfig, TracingConfig};
pub use self::metrics::{
    create_metrics_router, init_metrics, record_batch, record_cache_access, record_dedup,
    record_http_request, record_quality_check, record_queue_depth, record_request,
    record_search, PrometheusMetrics,
};
pub use tracing_setup::{init_tracing, shutdown_tracing};
