//! Observability configuration

use serde::Deserialize;

use crate::domain::DomainError;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.tracing.validate()?;
        self.metrics.validate()
    }
}

/// OpenTelemetry export; console logging is configured separately
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// OTLP gRPC endpoint
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Fraction of traces exported, 0.0 to 1.0
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

impl TracingConfig {
    fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.sampling_ratio) {
            return Err(DomainError::configuration(format!(
                "observability.tracing.sampling_ratio must be within [0, 1], got {}",
                self.sampling_ratio
            )));
        }
        Ok(())
    }
}

/// Prometheus exposition
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    /// Histogram buckets, in seconds, for every `*_duration_seconds` metric
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,
}

impl MetricsConfig {
    fn validate(&self) -> Result<(), DomainError> {
        if !self.path.starts_with('/') {
            return Err(DomainError::configuration(
                "observability.metrics.path must start with '/'",
            ));
        }

        let ascending = self.latency_buckets.windows(2).all(|w| w[0] < w[1]);
        if self.latency_buckets.is_empty() || !ascending {
            return Err(DomainError::configuration(
                "observability.metrics.latency_buckets must be non-empty and strictly ascending",
            ));
        }

        Ok(())
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "support-orchestrator".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

// Cache hits sit in the low milliseconds, remote model calls in the seconds
fn default_latency_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
            latency_buckets: default_latency_buckets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ObservabilityConfig::default();

        assert!(!config.tracing.enabled);
        assert_eq!(config.tracing.service_name, "support-orchestrator");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.path, "/metrics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sampling_ratio_out_of_range() {
        let config = ObservabilityConfig {
            tracing: TracingConfig {
                sampling_ratio: 1.5,
                ..TracingConfig::default()
            },
            ..ObservabilityConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buckets_must_ascend() {
        let mut metrics = MetricsConfig::default();
        metrics.latency_buckets = vec![0.5, 0.1];
        assert!(metrics.validate().is_err());

        metrics.latency_buckets.clear();
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn test_metrics_path_must_be_absolute() {
        let metrics = MetricsConfig {
            path: "metrics".to_string(),
            ..MetricsConfig::default()
        };

        assert!(metrics.validate().is_err());
    }
}
