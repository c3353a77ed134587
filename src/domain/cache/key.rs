//! Cache namespaces and content-hash key generation

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::DomainError;

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

/// Independent key spaces in the cache store, each with its own volatility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    Embedding,
    Intent,
    Translation,
    Typo,
    Search,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 5] = [
        CacheNamespace::Embedding,
        CacheNamespace::Intent,
        CacheNamespace::Translation,
        CacheNamespace::Typo,
        CacheNamespace::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Embedding => "embedding",
            CacheNamespace::Intent => "intent",
            CacheNamespace::Translation => "translation",
            CacheNamespace::Typo => "typo",
            CacheNamespace::Search => "search",
        }
    }

    /// Default TTL for entries in this namespace.
    ///
    /// Embeddings and typo corrections are stable for a given input, intent
    /// analyses drift with prompt changes, and search result sets go stale as
    /// soon as the index content changes.
    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheNamespace::Embedding => Duration::from_secs(7 * DAY),
            CacheNamespace::Typo => Duration::from_secs(7 * DAY),
            CacheNamespace::Translation => Duration::from_secs(3 * DAY),
            CacheNamespace::Intent => Duration::from_secs(DAY),
            CacheNamespace::Search => Duration::from_secs(HOUR),
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheNamespace {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embedding" | "embeddings" => Ok(CacheNamespace::Embedding),
            "intent" => Ok(CacheNamespace::Intent),
            "translation" => Ok(CacheNamespace::Translation),
            "typo" => Ok(CacheNamespace::Typo),
            "search" => Ok(CacheNamespace::Search),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache namespace: {}. Valid namespaces: embedding, intent, translation, typo, search",
                s
            ))),
        }
    }
}

/// Number of hex characters kept from the SHA-256 digest
pub const KEY_DIGEST_LEN: usize = 16;

/// Builds `namespace:digest` keys from arbitrary content
#[derive(Debug, Clone, Default)]
pub struct ContentKeyGenerator {
    prefix: Option<String>,
}

impl ContentKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes every generated key, e.g. to share one Redis database
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Truncated hex digest of the content
    pub fn digest(content: &str) -> String {
        let hash = Sha256::digest(content.as_bytes());
        let mut hex = hex::encode(hash);
        hex.truncate(KEY_DIGEST_LEN);
        hex
    }

    pub fn generate(&self, namespace: CacheNamespace, content: &str) -> String {
        format!("{}{}", self.namespace_prefix(namespace), Self::digest(content))
    }

    /// Key prefix shared by every entry of a namespace (ends with `:`)
    pub fn namespace_prefix(&self, namespace: CacheNamespace) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}:", prefix, namespace),
            None => format!("{}:", namespace),
        }
    }
}
