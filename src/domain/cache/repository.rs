//! Cache backend trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Key/value backend with per-entry TTL
///
/// Values are JSON strings so the trait stays dyn-compatible; use
/// [`CacheBackendExt`] for typed access.
#[async_trait]
pub trait CacheBackend: Send + Sync + Debug {
    /// Gets a raw JSON value, `None` when missing or expired
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a single key
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes every key starting with `prefix`, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError>;

    /// Checks if a live entry exists
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Remaining TTL for a key
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Approximate number of entries
    async fn size(&self) -> Result<usize, DomainError>;

    /// Short backend identifier for stats and logs
    fn backend_name(&self) -> &'static str;

    /// Whether calls are currently served by a fallback instead of the configured backend
    fn is_degraded(&self) -> bool {
        false
    }
}

/// Typed get/set on top of [`CacheBackend`]
pub trait CacheBackendExt: CacheBackend {
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

impl<T: CacheBackend + ?Sized> CacheBackendExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Map-backed cache that can be switched into a failing state
    #[derive(Debug, Default)]
    pub struct MockCacheBackend {
        entries: Mutex<HashMap<String, String>>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockCacheBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let backend = Self::default();
            backend.set_failing(true);
            backend
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of backend calls made so far, failed ones included
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.failing.load(Ordering::SeqCst) {
                return Err(DomainError::cache("connection refused"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CacheBackend for MockCacheBackend {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set_raw(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), DomainError> {
            self.check()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
            self.check()?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            Ok(before - entries.len())
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, DomainError> {
            self.check()?;
            Ok(None)
        }

        async fn size(&self) -> Result<usize, DomainError> {
            self.check()?;
            Ok(self.entries.lock().unwrap().len())
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_backend_typed_roundtrip() {
            let backend = MockCacheBackend::new();
            backend
                .set("key1", &vec![1.0f32, 2.0], Duration::from_secs(60))
                .await
                .unwrap();

            let value: Option<Vec<f32>> = backend.get("key1").await.unwrap();
            assert_eq!(value, Some(vec![1.0, 2.0]));
        }

        #[tokio::test]
        async fn test_mock_backend_failing() {
            let backend = MockCacheBackend::failing();

            let result: Result<Option<String>, _> = backend.get("key").await;
            assert!(result.is_err());
            assert_eq!(backend.calls(), 1);
        }

        #[tokio::test]
        async fn test_mock_backend_delete_prefix() {
            let backend = MockCacheBackend::new();
            let ttl = Duration::from_secs(60);
            backend.set_raw("intent:a", "1", ttl).await.unwrap();
            backend.set_raw("intent:b", "2", ttl).await.unwrap();
            backend.set_raw("search:a", "3", ttl).await.unwrap();

            assert_eq!(backend.delete_prefix("intent:").await.unwrap(), 2);
            assert_eq!(backend.size().await.unwrap(), 1);
        }
    }
}
