//! In-memory cache backend using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::CacheBackend;
use crate::domain::DomainError;

/// Configuration for the in-memory backend
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Upper bound on any entry's lifetime, regardless of the TTL it was set with
    pub max_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            max_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local backend, also the degradation target when Redis is unavailable
///
/// Entries carry their own expiry; an expired entry is never returned even if
/// moka has not evicted it yet. Nothing survives a restart.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    config: InMemoryCacheConfig,
    stand_in: bool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.max_ttl)
            .build();

        Self {
            cache,
            config,
            stand_in: false,
        }
    }

    /// Marks this cache as standing in for a networked backend that could not be reached
    pub fn as_stand_in(mut self) -> Self {
        self.stand_in = true;
        self
    }

    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.cache.get(key).await?;

        if entry.is_expired() {
            self.cache.invalidate(key).await;
            return None;
        }

        Some(entry)
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.live_entry(key).await.map(|entry| entry.data))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: Instant::now() + ttl.min(self.config.max_ttl),
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;

        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect();

        for key in &keys {
            self.cache.invalidate(key).await;
        }

        Ok(keys.len())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        Ok(self
            .live_entry(key)
            .await
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now())))
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }

    fn is_degraded(&self) -> bool {
        self.stand_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheBackendExt;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_millis(200);

        cache.set("key1", &"value1", ttl).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        let before: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(before, Some("value1".to_string()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        let after: Option<String> = cache.get("key1").await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_ttl_clamped_to_max() {
        let config = InMemoryCacheConfig::default().with_max_ttl(Duration::from_secs(10));
        let cache = InMemoryCache::with_config(config);

        cache
            .set_raw("key1", "\"v\"", Duration::from_secs(3600))
            .await
            .unwrap();

        let remaining = cache.ttl("key1").await.unwrap().unwrap();
        assert!(remaining <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.exists("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_prefix_leaves_other_namespaces() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set_raw("intent:aaa", "1", ttl).await.unwrap();
        cache.set_raw("intent:bbb", "2", ttl).await.unwrap();
        cache.set_raw("embedding:aaa", "3", ttl).await.unwrap();

        let deleted = cache.delete_prefix("intent:").await.unwrap();
        assert_eq!(deleted, 2);

        assert!(!cache.exists("intent:aaa").await.unwrap());
        assert!(cache.exists("embedding:aaa").await.unwrap());
    }

    #[tokio::test]
    async fn test_size() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);

        cache.set_raw("a", "1", ttl).await.unwrap();
        cache.set_raw("b", "2", ttl).await.unwrap();

        assert_eq!(cache.size().await.unwrap(), 2);
    }
}
