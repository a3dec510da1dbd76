//! Before/after-access synchronization between the client-held cache and a
//! backing store.
//!
//! The credential client invokes [`CacheSynchronizer::before_access`]
//! immediately before every read/write of its in-memory cache and
//! [`CacheSynchronizer::after_access`] immediately after. The synchronizer
//! makes no assumption about when those calls happen beyond that ordering and
//! is safe under repeated invocation.

use std::sync::Arc;

use sigil_core::Claims;

use crate::error::CacheError;
use crate::key;
use crate::state::ClientTokenCache;
use crate::store::TokenCacheStore;

/// Supplies the claims of the currently signed-in user.
///
/// Re-evaluated on every cache access: in a web application the signed-in
/// identity is request-scoped and can differ between calls on the same
/// synchronizer instance.
pub trait ClaimsProvider: Send + Sync {
    /// Returns the current user's claims, or `None` when no user is
    /// signed in.
    fn current_claims(&self) -> Option<Claims>;
}

impl<F> ClaimsProvider for F
where
    F: Fn() -> Option<Claims> + Send + Sync,
{
    fn current_claims(&self) -> Option<Claims> {
        self()
    }
}

/// The principal a synchronizer is bound to.
enum Owner {
    /// Application (client-credential) cache; the key is fixed for the
    /// process lifetime.
    Application { key: String },
    /// Per-user cache; the key is derived from request-scoped claims on
    /// every access.
    User { provider: Arc<dyn ClaimsProvider> },
}

/// Keeps a client-held in-memory token cache synchronized with a
/// [`TokenCacheStore`].
///
/// Binding to an owner happens at construction: either a fixed application
/// client id, or a [`ClaimsProvider`] resolved per access. Construction with
/// an empty client id is a configuration error — missing configuration fails
/// fast rather than surfacing as misses at access time.
pub struct CacheSynchronizer {
    owner: Owner,
    store: Arc<dyn TokenCacheStore>,
}

impl std::fmt::Debug for CacheSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = match &self.owner {
            Owner::Application { key } => format!("Application {{ key: {key:?} }}"),
            Owner::User { .. } => "User".to_string(),
        };
        f.debug_struct("CacheSynchronizer")
            .field("owner", &owner)
            .finish_non_exhaustive()
    }
}

impl CacheSynchronizer {
    /// Creates a synchronizer for an application token cache.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if `client_id` is empty.
    pub fn for_application(
        client_id: impl Into<String>,
        store: Arc<dyn TokenCacheStore>,
    ) -> Result<Self, CacheError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(CacheError::configuration(
                "application token cache requires a non-empty client id",
            ));
        }
        Ok(Self {
            owner: Owner::Application {
                key: key::app_cache_key(&client_id),
            },
            store,
        })
    }

    /// Creates a synchronizer for per-user token caches.
    #[must_use]
    pub fn for_user(provider: Arc<dyn ClaimsProvider>, store: Arc<dyn TokenCacheStore>) -> Self {
        Self {
            owner: Owner::User { provider },
            store,
        }
    }

    /// Resolves the owner key for the current access, if one is available.
    fn current_key(&self) -> Option<String> {
        match &self.owner {
            Owner::Application { key } => Some(key.clone()),
            Owner::User { provider } => provider
                .current_claims()
                .as_ref()
                .and_then(key::user_cache_key),
        }
    }

    /// Reloads the in-memory cache from the backing store.
    ///
    /// The stored blob replaces the in-memory content entirely; when no key
    /// can be derived or no entry exists, the in-memory cache is cleared so
    /// the client re-authenticates.
    ///
    /// # Errors
    ///
    /// Propagates backing-store infrastructure failures.
    pub async fn before_access(&self, cache: &mut dyn ClientTokenCache) -> Result<(), CacheError> {
        let Some(cache_key) = self.current_key() else {
            tracing::trace!("no owner key for this access, clearing in-memory cache");
            cache.replace(None);
            return Ok(());
        };

        let stored = self.store.load(&cache_key).await?;
        tracing::trace!(
            key = %cache_key,
            backend = self.store.backend_name(),
            found = stored.is_some(),
            "loaded token cache entry"
        );
        cache.replace(stored.as_deref());
        Ok(())
    }

    /// Persists the in-memory cache if its content changed during the access.
    ///
    /// Unchanged content performs no store write. When no owner key can be
    /// derived the write is skipped; the changed signal is left raised so a
    /// later access with a resolvable key persists the state.
    ///
    /// # Errors
    ///
    /// Propagates backing-store infrastructure failures.
    pub async fn after_access(&self, cache: &mut dyn ClientTokenCache) -> Result<(), CacheError> {
        if !cache.has_state_changed() {
            return Ok(());
        }

        let Some(cache_key) = self.current_key() else {
            tracing::trace!("no owner key for this access, skipping persist");
            return Ok(());
        };

        let payload = cache.snapshot();
        self.store.persist(&cache_key, &payload).await?;
        cache.reset_state_changed();
        tracing::debug!(
            key = %cache_key,
            backend = self.store.backend_name(),
            bytes = payload.len(),
            "persisted token cache entry"
        );
        Ok(())
    }

    /// Removes the stored entry for `key` (sign-out / clear-account).
    ///
    /// The next `before_access` for that owner reloads an empty cache.
    ///
    /// # Errors
    ///
    /// Propagates backing-store infrastructure failures.
    pub async fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(key).await?;
        tracing::debug!(key = %key, backend = self.store.backend_name(), "cleared token cache entry");
        Ok(())
    }

    /// Removes the stored entry for the current owner, if a key resolves.
    ///
    /// # Errors
    ///
    /// Propagates backing-store infrastructure failures.
    pub async fn clear_current(&self) -> Result<(), CacheError> {
        match self.current_key() {
            Some(cache_key) => self.clear(&cache_key).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTokenStore;
    use crate::state::TokenCacheState;
    use async_trait::async_trait;
    use sigil_core::names;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper counting writes, for the no-op-skip property.
    struct CountingStore {
        inner: InMemoryTokenStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryTokenStore::with_defaults(),
                writes: AtomicUsize::new(0),
            }
        }

        fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenCacheStore for CountingStore {
        async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.load(key).await
        }

        async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.persist(key, payload).await
        }

        async fn remove(&self, key: &str) -> Result<(), CacheError> {
            self.inner.remove(key).await
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    fn user_provider() -> Arc<dyn ClaimsProvider> {
        Arc::new(|| {
            Some(
                Claims::new()
                    .with(names::OID, "object-1")
                    .with(names::TID, "tenant-1"),
            )
        })
    }

    #[test]
    fn test_for_application_rejects_empty_client_id() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        let err = CacheSynchronizer::for_application("  ", store).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_round_trip_for_application() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        let sync = CacheSynchronizer::for_application("client-1", store).unwrap();

        let mut cache = TokenCacheState::new();
        sync.before_access(&mut cache).await.unwrap();
        assert!(cache.is_empty());

        cache.write(b"blob-a".to_vec());
        sync.after_access(&mut cache).await.unwrap();
        assert!(!cache.has_state_changed());

        let mut fresh = TokenCacheState::new();
        sync.before_access(&mut fresh).await.unwrap();
        assert_eq!(fresh.bytes(), b"blob-a");
    }

    #[tokio::test]
    async fn test_before_access_replaces_existing_content() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        store.persist("client-1_AppTokenCache", b"stored").await.unwrap();
        let sync = CacheSynchronizer::for_application("client-1", store).unwrap();

        let mut cache = TokenCacheState::new();
        cache.replace(Some(b"stale local content"));
        sync.before_access(&mut cache).await.unwrap();
        assert_eq!(cache.bytes(), b"stored");
    }

    #[tokio::test]
    async fn test_before_access_clears_when_store_is_empty() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        let sync = CacheSynchronizer::for_application("client-1", store).unwrap();

        let mut cache = TokenCacheState::new();
        cache.replace(Some(b"stale local content"));
        sync.before_access(&mut cache).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_after_access_skips_unchanged_content() {
        let store = Arc::new(CountingStore::new());
        let sync = CacheSynchronizer::for_user(user_provider(), store.clone());

        let mut cache = TokenCacheState::new();
        cache.write(b"blob".to_vec());
        sync.after_access(&mut cache).await.unwrap();
        assert_eq!(store.write_count(), 1);

        // Unchanged content must not write again.
        sync.after_access(&mut cache).await.unwrap();
        sync.after_access(&mut cache).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_user_without_resolvable_key_gets_empty_cache() {
        let store = Arc::new(CountingStore::new());
        let provider: Arc<dyn ClaimsProvider> = Arc::new(|| Some(Claims::new()));
        let sync = CacheSynchronizer::for_user(provider, store.clone());

        let mut cache = TokenCacheState::new();
        cache.replace(Some(b"leftover"));
        sync.before_access(&mut cache).await.unwrap();
        assert!(cache.is_empty());

        cache.write(b"blob".to_vec());
        sync.after_access(&mut cache).await.unwrap();
        assert_eq!(store.write_count(), 0);
        assert!(cache.has_state_changed());
    }

    #[tokio::test]
    async fn test_clear_then_reload_is_empty() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        let sync = CacheSynchronizer::for_user(user_provider(), store);

        let mut cache = TokenCacheState::new();
        cache.write(b"blob".to_vec());
        sync.after_access(&mut cache).await.unwrap();

        sync.clear("object-1.tenant-1").await.unwrap();
        sync.before_access(&mut cache).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_current_resolves_user_key() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        let sync = CacheSynchronizer::for_user(user_provider(), store.clone());

        store.persist("object-1.tenant-1", b"blob").await.unwrap();
        sync.clear_current().await.unwrap();
        assert_eq!(store.load("object-1.tenant-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repeated_before_access_is_safe() {
        let store = Arc::new(InMemoryTokenStore::with_defaults());
        store.persist("client-1_AppTokenCache", b"blob").await.unwrap();
        let sync = CacheSynchronizer::for_application("client-1", store).unwrap();

        let mut cache = TokenCacheState::new();
        sync.before_access(&mut cache).await.unwrap();
        sync.before_access(&mut cache).await.unwrap();
        assert_eq!(cache.bytes(), b"blob");
        assert!(!cache.has_state_changed());
    }
}
