use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::cache::CacheNamespace;
use crate::domain::quality::QualityConfig;
use crate::domain::retrieval::RetrievalConfig;
use crate::domain::DomainError;
use crate::infrastructure::batch::BatchSchedulerConfig;
use crate::infrastructure::cache::{CacheBackendConfig, CacheStoreConfig, CacheType};
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::orchestrator::OrchestratorConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchSchedulerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Cache backend and namespace TTLs
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// `in_memory` or `redis`
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Per-namespace TTL overrides in seconds
    #[serde(default)]
    pub ttl_secs: HashMap<CacheNamespace, u64>,
}

fn default_cache_backend() -> String {
    "in_memory".to_string()
}

fn default_connection_timeout_secs() -> u64 {
    5
}

fn default_max_capacity() -> u64 {
    10_000
}

impl CacheConfig {
    pub fn backend_config(&self) -> Result<CacheBackendConfig, DomainError> {
        let cache_type: CacheType = self.backend.parse()?;
        let max_ttl = CacheNamespace::ALL
            .iter()
            .map(|ns| self.ttl_for(*ns))
            .max()
            .unwrap_or_default();

        Ok(CacheBackendConfig {
            cache_type,
            redis_url: self.redis_url.clone(),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            max_capacity: self.max_capacity,
            max_ttl,
        })
    }

    pub fn store_config(&self) -> CacheStoreConfig {
        let config = self
            .ttl_secs
            .iter()
            .fold(CacheStoreConfig::new(), |config, (ns, secs)| {
                config.with_ttl(*ns, Duration::from_secs(*secs))
            });

        match &self.key_prefix {
            Some(prefix) => config.with_key_prefix(prefix.clone()),
            None => config,
        }
    }

    fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.ttl_secs
            .get(&namespace)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| namespace.default_ttl())
    }
}

/// Remote collaborators
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_dimensions: Option<usize>,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorIndexBackend {
    #[default]
    InMemory,
    Pinecone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorIndexConfig {
    #[serde(default)]
    pub backend: VectorIndexBackend,
    #[serde(default = "default_index_name")]
    pub name: String,
    /// Pinecone index host, e.g. `https://faq-abc123.svc.us-east-1.pinecone.io`
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

fn default_index_name() -> String {
    "support-faq".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            redis_url: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            max_capacity: default_max_capacity(),
            key_prefix: None,
            ttl_secs: HashMap::new(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: VectorIndexBackend::default(),
            name: default_index_name(),
            host: None,
            api_key: None,
            namespace: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Rejects settings the components would refuse at startup
    pub fn validate(&self) -> Result<(), DomainError> {
        self.observability.validate()?;
        self.batch.validate()?;
        self.orchestrator.validate()?;
        self.retrieval.validate()?;
        self.quality.validate()?;
        self.cache.backend_config()?;

        if self.providers.vector_index.backend == VectorIndexBackend::Pinecone
            && self.providers.vector_index.host.is_none()
        {
            return Err(DomainError::configuration(
                "providers.vector_index.host is required for the pinecone backend",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_json(json: serde_json::Value) -> AppConfig {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.providers.vector_index.backend, VectorIndexBackend::InMemory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = from_json(serde_json::json!({
            "logging": {"format": "json"},
            "batch": {"max_batch_size": 8},
            "cache": {"ttl_secs": {"search": 60}},
        }));

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.batch.max_batch_size, 8);
        assert_eq!(
            config.cache.store_config().ttl_for(CacheNamespace::Search),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.cache.store_config().ttl_for(CacheNamespace::Embedding),
            CacheNamespace::Embedding.default_ttl()
        );
    }

    #[test]
    fn test_shipped_default_file_matches_builtin_defaults() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let builtin = AppConfig::default();

        assert_eq!(config.server.port, builtin.server.port);
        assert_eq!(config.batch.max_batch_size, builtin.batch.max_batch_size);
        assert_eq!(config.orchestrator.replay_window_ms, builtin.orchestrator.replay_window_ms);
        assert_eq!(config.retrieval.top_k, builtin.retrieval.top_k);
        for namespace in CacheNamespace::ALL {
            assert_eq!(
                config.cache.store_config().ttl_for(namespace),
                namespace.default_ttl()
            );
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_cache_backend_is_rejected() {
        let config = from_json(serde_json::json!({"cache": {"backend": "memcached"}}));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pinecone_requires_host() {
        let config = from_json(serde_json::json!({
            "providers": {"vector_index": {"backend": "pinecone"}}
        }));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backend_config_uses_longest_ttl() {
        let config = CacheConfig {
            ttl_secs: HashMap::from([(CacheNamespace::Typo, 90 * 24 * 60 * 60)]),
            ..Default::default()
        };

        let backend = config.backend_config().unwrap();
        assert_eq!(backend.cache_type, CacheType::InMemory);
        assert_eq!(backend.max_ttl, Duration::from_secs(90 * 24 * 60 * 60));
    }
}
