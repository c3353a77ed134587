//! Cache infrastructure - backends and the namespaced cache store

mod degrading;
mod factory;
mod in_memory;
mod redis;
mod store;

pub use degrading::DegradingCache;
pub use factory::{CacheBackendConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use self::redis::{RedisCache, RedisCacheConfig};
pub use store::{CacheStore, CacheStoreConfig, CacheStoreStats, NamespaceStats};
