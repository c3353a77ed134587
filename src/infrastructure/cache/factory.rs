//! Cache backend selection at startup

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::cache::CacheBackend;
use crate::domain::DomainError;

use super::degrading::DegradingCache;
use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Supported cache backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheType {
    /// In-process moka cache
    #[default]
    InMemory,
    /// Redis, with an in-process fallback
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Backend configuration for the factory
#[derive(Debug, Clone)]
pub struct CacheBackendConfig {
    pub cache_type: CacheType,
    /// Redis URL (required for the Redis type)
    pub redis_url: Option<String>,
    pub connection_timeout: Duration,
    /// Maximum entries held in process
    pub max_capacity: u64,
    /// Longest TTL any namespace uses
    pub max_ttl: Duration,
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            connection_timeout: Duration::from_secs(5),
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl CacheBackendConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    fn in_memory_config(&self) -> InMemoryCacheConfig {
        InMemoryCacheConfig::default()
            .with_max_capacity(self.max_capacity)
            .with_max_ttl(self.max_ttl)
    }
}

/// Creates the cache backend selected in configuration
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    /// Builds the configured backend.
    ///
    /// A Redis backend that cannot be reached at startup is replaced by an
    /// in-memory stand-in that reports itself as degraded; only a missing
    /// Redis URL is an error.
    pub async fn create(
        &self,
        config: &CacheBackendConfig,
    ) -> Result<Arc<dyn CacheBackend>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => {
                info!(capacity = config.max_capacity, "Using in-memory cache backend");
                Ok(Arc::new(InMemoryCache::with_config(config.in_memory_config())))
            }
            CacheType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for Redis cache type")
                })?;

                let redis_config =
                    RedisCacheConfig::new(url).with_connection_timeout(config.connection_timeout);

                match RedisCache::new(redis_config).await {
                    Ok(redis) => {
                        info!("Using Redis cache backend with in-memory fallback");
                        let fallback = InMemoryCache::with_config(config.in_memory_config());
                        Ok(Arc::new(DegradingCache::new(Arc::new(redis), fallback)))
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            "Redis unavailable at startup, serving cache from process memory"
                        );
                        let stand_in =
                            InMemoryCache::with_config(config.in_memory_config()).as_stand_in();
                        Ok(Arc::new(stand_in))
                    }
                }
            }
        }
    }
}
