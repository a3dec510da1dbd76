//! # sigil-cache-redis
//!
//! Distributed token-cache store backed by Redis.
//!
//! Every load round-trips to Redis — there is no in-process staleness copy,
//! so replicas sharing the instance always observe the latest persisted blob.
//! Concurrent read-then-write sequences for the same key resolve last-writer
//! -wins; merging concurrent cache states is the credential client's concern,
//! not this store's.
//!
//! Entries carry a sliding expiration: reads renew the TTL, so actively used
//! caches stay warm while abandoned ones age out server-side.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use sigil_cache::{CacheError, TokenCacheStore};

/// Configuration for [`RedisTokenStore`].
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Sliding entry lifetime, renewed on every read (default: 14 days).
    /// `None` stores entries without expiration.
    pub sliding_expiration: Option<Duration>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            sliding_expiration: Some(Duration::from_secs(14 * 24 * 3600)), // 14 days
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sliding entry lifetime.
    #[must_use]
    pub fn with_sliding_expiration(mut self, ttl: Duration) -> Self {
        self.sliding_expiration = Some(ttl);
        self
    }

    /// Stores entries without expiration.
    #[must_use]
    pub fn without_expiration(mut self) -> Self {
        self.sliding_expiration = None;
        self
    }
}

/// Redis-backed token-cache store.
///
/// No local locking: the server's per-command atomicity is relied upon, and
/// concurrent writers for the same key settle last-writer-wins.
#[derive(Debug)]
pub struct RedisTokenStore {
    pool: Pool,
    config: RedisStoreConfig,
}

impl RedisTokenStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: Pool, config: RedisStoreConfig) -> Self {
        Self { pool, config }
    }

    /// Creates a store by building a pool from a Redis URL.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if the URL is invalid or the pool
    /// cannot be created.
    pub fn connect(url: &str, config: RedisStoreConfig) -> Result<Self, CacheError> {
        let pool_config = deadpool_redis::Config::from_url(url);
        let pool = pool_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::configuration(format!("invalid Redis configuration: {e}")))?;
        Ok(Self::new(pool, config))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::connection(format!("failed to get Redis connection: {e}")))
    }
}

#[async_trait]
impl TokenCacheStore for RedisTokenStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;

        let payload: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::connection(format!("Redis GET failed: {e}")))?;

        // Renew the sliding window; a failed renewal degrades the entry's
        // lifetime, not the read.
        if payload.is_some()
            && let Some(ttl) = self.config.sliding_expiration
            && let Err(e) = conn.expire::<_, ()>(key, ttl.as_secs() as i64).await
        {
            tracing::warn!(key = %key, error = %e, "Redis EXPIRE failed");
        }

        tracing::trace!(key = %key, found = payload.is_some(), "loaded token cache entry from Redis");
        Ok(payload)
    }

    async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;

        match self.config.sliding_expiration {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, payload, ttl.as_secs())
                .await
                .map_err(|e| CacheError::connection(format!("Redis SET failed: {e}")))?,
            None => conn
                .set::<_, _, ()>(key, payload)
                .await
                .map_err(|e| CacheError::connection(format!("Redis SET failed: {e}")))?,
        }

        tracing::trace!(key = %key, bytes = payload.len(), "persisted token cache entry to Redis");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::connection(format!("Redis DEL failed: {e}")))?;
        tracing::trace!(key = %key, "removed token cache entry from Redis");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
