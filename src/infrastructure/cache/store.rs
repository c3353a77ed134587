//! Namespaced cache store used by the orchestrator and the retrieval scorer

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::cache::{CacheBackend, CacheBackendExt, CacheNamespace, ContentKeyGenerator};
use crate::infrastructure::observability::record_cache_access;

/// TTLs and key layout for the store
#[derive(Debug, Clone, Default)]
pub struct CacheStoreConfig {
    ttl_overrides: HashMap<CacheNamespace, Duration>,
    key_prefix: Option<String>,
}

impl CacheStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, namespace: CacheNamespace, ttl: Duration) -> Self {
        self.ttl_overrides.insert(namespace, ttl);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.ttl_overrides
            .get(&namespace)
            .copied()
            .unwrap_or_else(|| namespace.default_ttl())
    }
}

#[derive(Debug, Default)]
struct NamespaceCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl NamespaceCounters {
    fn snapshot(&self) -> NamespaceStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        NamespaceStats {
            hits,
            misses,
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_ratio: ratio(hits, misses),
        }
    }
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Counters for a single namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub errors: u64,
    pub hit_ratio: f64,
}

/// Point-in-time view of the cache store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStoreStats {
    pub backend: String,
    pub degraded: bool,
    /// `None` when the backend could not report its size
    pub entries: Option<usize>,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub namespaces: BTreeMap<CacheNamespace, NamespaceStats>,
}

/// Content-addressed cache split into independent namespaces.
///
/// Backend failures never reach callers: a failed read is a miss and a failed
/// write is dropped, both logged and counted.
#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    keys: ContentKeyGenerator,
    config: CacheStoreConfig,
    counters: Arc<HashMap<CacheNamespace, NamespaceCounters>>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_config(backend, CacheStoreConfig::default())
    }

    pub fn with_config(backend: Arc<dyn CacheBackend>, config: CacheStoreConfig) -> Self {
        let keys = match &config.key_prefix {
            Some(prefix) => ContentKeyGenerator::new().with_prefix(prefix.clone()),
            None => ContentKeyGenerator::new(),
        };

        let counters = CacheNamespace::ALL
            .iter()
            .map(|ns| (*ns, NamespaceCounters::default()))
            .collect();

        Self {
            backend,
            keys,
            config,
            counters: Arc::new(counters),
        }
    }

    pub fn ttl_for(&self, namespace: CacheNamespace) -> Duration {
        self.config.ttl_for(namespace)
    }

    pub fn is_degraded(&self) -> bool {
        self.backend.is_degraded()
    }

    fn counters(&self, namespace: CacheNamespace) -> Option<&NamespaceCounters> {
        self.counters.get(&namespace)
    }

    fn count(&self, namespace: CacheNamespace, outcome: &'static str) {
        if let Some(counters) = self.counters(namespace) {
            let counter = match outcome {
                "hit" => &counters.hits,
                "miss" => &counters.misses,
                "write" => &counters.writes,
                _ => &counters.errors,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
        record_cache_access(namespace.as_str(), outcome);
    }

    /// Looks up the value cached for `content`, `None` on miss or backend failure
    pub async fn get<V>(&self, namespace: CacheNamespace, content: &str) -> Option<V>
    where
        V: DeserializeOwned + Send,
    {
        let key = self.keys.generate(namespace, content);

        match self.backend.get::<V>(&key).await {
            Ok(Some(value)) => {
                debug!(namespace = %namespace, key = %key, "Cache hit");
                self.count(namespace, "hit");
                Some(value)
            }
            Ok(None) => {
                self.count(namespace, "miss");
                None
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Cache read failed, treating as miss");
                self.count(namespace, "error");
                self.count(namespace, "miss");
                None
            }
        }
    }

    /// Stores a value for `content`; `ttl` falls back to the namespace TTL
    pub async fn set<V>(
        &self,
        namespace: CacheNamespace,
        content: &str,
        value: &V,
        ttl: Option<Duration>,
    ) where
        V: Serialize + Send + Sync,
    {
        let key = self.keys.generate(namespace, content);
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(namespace));

        match self.backend.set(&key, value, ttl).await {
            Ok(()) => self.count(namespace, "write"),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Cache write failed, value dropped");
                self.count(namespace, "error");
            }
        }
    }

    /// Removes every entry of one namespace, returning how many were removed
    pub async fn clear(&self, namespace: CacheNamespace) -> usize {
        let prefix = self.keys.namespace_prefix(namespace);

        match self.backend.delete_prefix(&prefix).await {
            Ok(removed) => {
                debug!(namespace = %namespace, removed, "Cache namespace cleared");
                removed
            }
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Failed to clear cache namespace");
                self.count(namespace, "error");
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStoreStats {
        let namespaces: BTreeMap<CacheNamespace, NamespaceStats> = self
            .counters
            .iter()
            .map(|(ns, counters)| (*ns, counters.snapshot()))
            .collect();

        let hits = namespaces.values().map(|s| s.hits).sum();
        let misses = namespaces.values().map(|s| s.misses).sum();

        let entries = match self.backend.size().await {
            Ok(size) => Some(size),
            Err(e) => {
                debug!(error = %e, "Cache backend size unavailable");
                None
            }
        };

        CacheStoreStats {
            backend: self.backend.backend_name().to_string(),
            degraded: self.backend.is_degraded(),
            entries,
            hits,
            misses,
            hit_ratio: ratio(hits, misses),
            namespaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheBackend;
    use crate::infrastructure::cache::InMemoryCache;

    fn store() -> CacheStore {
        CacheStore::new(Arc::new(InMemoryCache::new()))
    }

    #[tokio::test]
    async fn test_get_after_set() {
        let store = store();

        store
            .set(CacheNamespace::Embedding, "hello", &vec![0.1f32, 0.2], None)
            .await;

        let value: Option<Vec<f32>> = store.get(CacheNamespace::Embedding, "hello").await;
        assert_eq!(value, Some(vec![0.1, 0.2]));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = store();

        store
            .set(CacheNamespace::Intent, "text", &"intent".to_string(), None)
            .await;

        let other: Option<String> = store.get(CacheNamespace::Translation, "text").await;
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let store = store();

        store
            .set(
                CacheNamespace::Search,
                "query",
                &"results".to_string(),
                Some(Duration::from_millis(150)),
            )
            .await;

        let before: Option<String> = store.get(CacheNamespace::Search, "query").await;
        assert!(before.is_some());

        tokio::time::sleep(Duration::from_millis(220)).await;

        let after: Option<String> = store.get(CacheNamespace::Search, "query").await;
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_namespace() {
        let store = store();

        store.set(CacheNamespace::Typo, "a", &"x".to_string(), None).await;
        store.set(CacheNamespace::Typo, "b", &"y".to_string(), None).await;
        store.set(CacheNamespace::Intent, "a", &"z".to_string(), None).await;

        assert_eq!(store.clear(CacheNamespace::Typo).await, 2);

        let typo: Option<String> = store.get(CacheNamespace::Typo, "a").await;
        let intent: Option<String> = store.get(CacheNamespace::Intent, "a").await;
        assert!(typo.is_none());
        assert_eq!(intent, Some("z".to_string()));
    }

    #[tokio::test]
    async fn test_backend_errors_become_misses() {
        let store = CacheStore::new(Arc::new(MockCacheBackend::failing()));

        store
            .set(CacheNamespace::Embedding, "text", &vec![1.0f32], None)
            .await;
        let value: Option<Vec<f32>> = store.get(CacheNamespace::Embedding, "text").await;

        assert!(value.is_none());

        let stats = store.stats().await;
        let embedding = &stats.namespaces[&CacheNamespace::Embedding];
        assert_eq!(embedding.errors, 2);
        assert_eq!(embedding.misses, 1);
        assert_eq!(embedding.writes, 0);
        assert!(stats.entries.is_none());
    }

    #[tokio::test]
    async fn test_stats_hit_ratio() {
        let store = store();

        store
            .set(CacheNamespace::Intent, "q", &"v".to_string(), None)
            .await;
        let _: Option<String> = store.get(CacheNamespace::Intent, "q").await;
        let _: Option<String> = store.get(CacheNamespace::Intent, "q").await;
        let _: Option<String> = store.get(CacheNamespace::Intent, "missing").await;

        let stats = store.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.backend, "in_memory");
        assert!(!stats.degraded);
        assert_eq!(stats.entries, Some(1));
    }

    #[test]
    fn test_ttl_overrides() {
        let config = CacheStoreConfig::new().with_ttl(CacheNamespace::Search, Duration::from_secs(60));

        assert_eq!(config.ttl_for(CacheNamespace::Search), Duration::from_secs(60));
        assert_eq!(
            config.ttl_for(CacheNamespace::Embedding),
            CacheNamespace::Embedding.default_ttl()
        );
    }
}
