//! Backend wrapper that falls back to an in-process map when the primary fails

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::cache::CacheBackend;
use crate::domain::DomainError;

use super::in_memory::InMemoryCache;

/// Routes every call to a primary backend, serving it from a local fallback
/// whenever the primary errors.
///
/// Writes made while degraded live only in the fallback and are lost on
/// restart. The degraded flag clears on the first successful primary call.
#[derive(Debug)]
pub struct DegradingCache {
    primary: Arc<dyn CacheBackend>,
    fallback: InMemoryCache,
    degraded: AtomicBool,
    primary_errors: AtomicU64,
}

impl DegradingCache {
    pub fn new(primary: Arc<dyn CacheBackend>, fallback: InMemoryCache) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
            primary_errors: AtomicU64::new(0),
        }
    }

    pub fn primary_errors(&self) -> u64 {
        self.primary_errors.load(Ordering::Relaxed)
    }

    fn record_failure(&self, operation: &str, error: &DomainError) {
        self.primary_errors.fetch_add(1, Ordering::Relaxed);

        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                backend = self.primary.backend_name(),
                operation,
                error = %error,
                "Cache backend unavailable, degrading to in-memory cache"
            );
        }
    }

    fn record_success(&self) {
        if self.degraded.swap(false, Ordering::Relaxed) {
            info!(
                backend = self.primary.backend_name(),
                "Cache backend recovered"
            );
        }
    }
}

#[async_trait]
impl CacheBackend for DegradingCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.primary.get_raw(key).await {
            Ok(Some(value)) => {
                self.record_success();
                Ok(Some(value))
            }
            // Entries written while degraded may only exist locally
            Ok(None) => {
                self.record_success();
                self.fallback.get_raw(key).await
            }
            Err(e) => {
                self.record_failure("get", &e);
                self.fallback.get_raw(key).await
            }
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        match self.primary.set_raw(key, value, ttl).await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(e) => {
                self.record_failure("set", &e);
                self.fallback.set_raw(key, value, ttl).await
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let local = self.fallback.delete(key).await?;

        match self.primary.delete(key).await {
            Ok(remote) => {
                self.record_success();
                Ok(remote || local)
            }
            Err(e) => {
                self.record_failure("delete", &e);
                Ok(local)
            }
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, DomainError> {
        let local = self.fallback.delete_prefix(prefix).await?;

        match self.primary.delete_prefix(prefix).await {
            Ok(remote) => {
                self.record_success();
                Ok(remote + local)
            }
            Err(e) => {
                self.record_failure("delete_prefix", &e);
                Ok(local)
            }
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        match self.primary.ttl(key).await {
            Ok(Some(ttl)) => Ok(Some(ttl)),
            Ok(None) => self.fallback.ttl(key).await,
            Err(e) => {
                self.record_failure("ttl", &e);
                self.fallback.ttl(key).await
            }
        }
    }

    async fn size(&self) -> Result<usize, DomainError> {
        let local = self.fallback.size().await?;

        match self.primary.size().await {
            Ok(remote) => Ok(remote + local),
            Err(e) => {
                self.record_failure("size", &e);
                Ok(local)
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        if self.is_degraded() {
            self.fallback.backend_name()
        } else {
            self.primary.backend_name()
        }
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}
