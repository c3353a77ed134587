//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let installed = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            &config.latency_buckets,
        )
        .and_then(|builder| builder.install_recorder());

    match installed {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!(path = %config.path, "Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    gauge!("support_orchestrator_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record a completed orchestrated request
pub fn record_request(operation: &str, strategy: &str, success: bool, duration: Duration) {
    let labels = [
        ("operation", operation.to_string()),
        ("strategy", strategy.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("orchestrator_requests_total", &labels).increment(1);
    histogram!("orchestrator_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a request served by another identical request (`absorbed` or `replayed`)
pub fn record_dedup(operation: &str, kind: &str) {
    counter!(
        "orchestrator_deduplicated_total",
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a cache store access; outcome is `hit`, `miss`, `write` or `error`
pub fn record_cache_access(namespace: &str, outcome: &str) {
    counter!(
        "cache_operations_total",
        "namespace" => namespace.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a dispatched batch
pub fn record_batch(operation: &str, size: usize, success: bool, duration: Duration) {
    let labels = [
        ("operation", operation.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("batches_total", &labels).increment(1);
    counter!("batch_items_total", &labels).increment(size as u64);
    histogram!("batch_size", &labels).record(size as f64);
    histogram!("batch_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record the pending queue depth of an operation
pub fn record_queue_depth(operation: &str, depth: usize) {
    gauge!("batch_queue_depth", "operation" => operation.to_string()).set(depth as f64);
}

/// Record a retrieval search
pub fn record_search(path: &str, results: usize, duration: Duration) {
    let labels = [("path", path.to_string())];

    counter!("retrieval_searches_total", &labels).increment(1);
    histogram!("retrieval_results", &labels).record(results as f64);
    histogram!("retrieval_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a quality gate evaluation
pub fn record_quality_check(verdict: &str, worst_issue: Option<&str>) {
    counter!(
        "quality_checks_total",
        "verdict" => verdict.to_string(),
        "issue" => worst_issue.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Replaces UUID and numeric path segments so labels stay low-cardinality
fn sanitize_path(path: &str) -> String {
    let sanitized = path
        .split('/')
        .map(|segment| {
            let is_id = uuid::Uuid::parse_str(segment).is_ok()
                || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()));
            if is_id { "{id}" } else { segment }
        })
        .collect::<Vec<_>>()
        .join("/");

    match sanitized.char_indices().nth(50) {
        Some((idx, _)) => sanitized[..idx].to_string(),
        None => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/v1/requests/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(sanitize_path(path), "/v1/requests/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        assert_eq!(sanitize_path("/api/users/123/orders"), "/api/users/{id}/orders");
    }

    #[test]
    fn test_sanitize_path_no_id() {
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/v1/process"), "/v1/process");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        assert!(sanitize_path(path).len() <= 50);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("embedding", "cache", true, Duration::from_millis(3));
        record_cache_access("embedding", "hit");
        record_batch("translation", 4, false, Duration::from_millis(20));
        record_quality_check("accept", None);
    }
}
