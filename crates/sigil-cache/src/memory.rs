//! Process-local token-cache store with absolute expiration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::store::TokenCacheStore;

/// Configuration for [`InMemoryTokenStore`].
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Absolute lifetime of an entry from its last write (default: 14 days).
    pub ttl: Duration,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(14 * 24 * 3600), // 14 days
        }
    }
}

impl MemoryStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the absolute entry lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A stored entry with its expiration bookkeeping.
#[derive(Debug, Clone)]
struct ExpiringEntry {
    payload: Vec<u8>,
    written_at: Instant,
    ttl: Duration,
}

impl ExpiringEntry {
    fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        Self {
            payload,
            written_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.written_at.elapsed() > self.ttl
    }
}

/// In-memory token-cache store.
///
/// Entries live in a concurrent map and expire a fixed duration after their
/// last write. Expired entries are dropped lazily on read; call
/// [`evict_expired`](Self::evict_expired) for an explicit sweep. The map's
/// own atomic get/insert/remove semantics make additional locking
/// unnecessary.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    entries: DashMap<String, ExpiringEntry>,
    config: MemoryStoreConfig,
}

impl InMemoryTokenStore {
    /// Creates a store with the specified configuration.
    #[must_use]
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Creates a store with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(MemoryStoreConfig::default())
    }

    /// Removes all expired entries.
    pub fn evict_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "evicted expired token cache entries");
        }
    }

    /// Returns the number of entries, including not-yet-evicted expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenCacheStore for InMemoryTokenStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.payload.clone()));
            }
            drop(entry);
            self.entries.remove(key);
            tracing::trace!(key = %key, "dropped expired token cache entry");
        }
        Ok(None)
    }

    async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            ExpiringEntry::new(payload.to_vec(), self.config.ttl),
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
