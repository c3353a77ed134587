//! Health check endpoints for Kubernetes probes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::api::types::Json;
use crate::infrastructure::orchestrator::OrchestratorStats;

use super::state::AppState;

/// Health response with component status and the orchestrator snapshot
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub degraded: bool,
    pub version: String,
    pub checks: Vec<HealthCheck>,
    pub latency_ms: u64,
    pub stats: OrchestratorStats,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Individual component health check
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }
}

/// GET /health
///
/// Degraded when the cache runs on its fallback or a batch worker has died;
/// both still serve traffic, so the status code stays 200.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let stats = state.orchestrator.stats().await;
    let checks = component_checks(&stats);

    let status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let response = HealthResponse {
        status,
        degraded: status == HealthStatus::Degraded,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
        latency_ms: start.elapsed().as_millis() as u64,
        stats,
    };

    (StatusCode::OK, Json(response))
}

/// Liveness check - the process is up and serving
pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

fn component_checks(stats: &OrchestratorStats) -> Vec<HealthCheck> {
    let mut checks = Vec::with_capacity(stats.batches.len() + 1);

    checks.push(if stats.cache.degraded {
        HealthCheck::degraded(
            "cache",
            format!("{} backend unavailable, serving from fallback", stats.cache.backend),
        )
    } else {
        HealthCheck::healthy("cache")
    });

    for (operation, batch) in &stats.batches {
        let name = format!("batch_workers.{}", operation);
        checks.push(if batch.all_workers_alive() {
            HealthCheck::healthy(name)
        } else {
            HealthCheck::degraded(
                name,
                format!("{} of {} workers alive", batch.workers_alive, batch.workers),
            )
        });
    }

    checks
}
