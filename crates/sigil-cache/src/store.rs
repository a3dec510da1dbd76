//! The backing-store contract all token-cache backends implement.

use async_trait::async_trait;

use crate::error::CacheError;

/// A durable store for opaque token-cache blobs, keyed per owner.
///
/// The payload is the credential client's serialized cache state; this layer
/// never interprets it. At most one entry exists per key at a time, and
/// `persist` is an idempotent replace-or-insert.
///
/// Implementations must be thread-safe (`Send + Sync`); concurrent operations
/// on different keys must not block each other.
///
/// # Example
///
/// ```ignore
/// use sigil_cache::{TokenCacheStore, CacheError};
///
/// async fn has_entry(store: &dyn TokenCacheStore, key: &str) -> Result<bool, CacheError> {
///     Ok(store.load(key).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait TokenCacheStore: Send + Sync {
    /// Fetches the stored blob for `key`.
    ///
    /// Returns `None` when no entry exists (first access, or a cleared
    /// account) — the caller treats that as an empty cache, not a failure.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, never for a missing
    /// entry.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Writes `payload` under `key`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Conflict` if an optimistic-concurrency backend
    /// exhausts its bounded retry; infrastructure failures propagate as-is.
    async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError>;

    /// Removes the entry for `key`. Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
