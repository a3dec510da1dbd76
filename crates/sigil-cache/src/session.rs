//! Web-session-backed token-cache store.
//!
//! The session object belonging to the current request is not guaranteed safe
//! for concurrent access across requests sharing a session id, so all session
//! I/O in the process funnels through one reader/writer lock: loads take the
//! read side (concurrent among themselves), persists and removals take the
//! write side (exclusive). The lock is shared across every
//! [`SessionTokenStore`] instance, not scoped per session id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::store::TokenCacheStore;

/// Serializes session I/O process-wide.
static SESSION_IO_LOCK: RwLock<()> = RwLock::const_new(());

/// The web session associated with the current request.
///
/// Mirrors the usual session contract of a web framework: state must be
/// explicitly loaded before reads and committed after writes, both
/// asynchronously; in between, access is plain key/value.
#[async_trait]
pub trait SessionState: Send + Sync {
    /// Loads the session state from its backing channel.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Session` if the state cannot be loaded.
    async fn load(&self) -> Result<(), CacheError>;

    /// Commits the session state back to its backing channel.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Session` if the state cannot be committed.
    async fn commit(&self) -> Result<(), CacheError>;

    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: Vec<u8>);

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str);
}

/// An in-process [`SessionState`] for tests and single-instance hosting.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionState for MemorySession {
    async fn load(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn commit(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().expect("session mutex poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.values
            .lock()
            .expect("session mutex poisoned")
            .insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.values.lock().expect("session mutex poisoned").remove(key);
    }
}

/// Token-cache store keeping blobs in the current request's session.
///
/// Cache entries ride along with the user's session cookie lifetime; clearing
/// the session clears the cached tokens. Each instance wraps the session of
/// one request, while write serialization spans all instances (see the module
/// docs).
pub struct SessionTokenStore {
    session: Arc<dyn SessionState>,
}

impl SessionTokenStore {
    /// Creates a store over the given session.
    #[must_use]
    pub fn new(session: Arc<dyn SessionState>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenCacheStore for SessionTokenStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let _guard = SESSION_IO_LOCK.read().await;
        self.session.load().await?;
        let value = self.session.get(key);
        tracing::trace!(key = %key, found = value.is_some(), "loaded token cache entry from session");
        Ok(value)
    }

    async fn persist(&self, key: &str, payload: &[u8]) -> Result<(), CacheError> {
        let _guard = SESSION_IO_LOCK.write().await;
        self.session.load().await?;
        self.session.set(key, payload.to_vec());
        self.session.commit().await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let _guard = SESSION_IO_LOCK.write().await;
        self.session.load().await?;
        self.session.remove(key);
        self.session.commit().await
    }

    fn backend_name(&self) -> &'static str {
        "session"
    }
}
