//! Cache domain - namespaced, TTL-bound key/value caching

mod key;
mod repository;

pub use key::{CacheNamespace, ContentKeyGenerator, KEY_DIGEST_LEN};
pub use repository::{CacheBackend, CacheBackendExt};

#[cfg(test)]
pub use repository::mock::MockCacheBackend;
