//! # sigil-cache
//!
//! Token-cache persistence abstraction for applications that acquire tokens
//! with a client-held credential cache (MSAL-style).
//!
//! The credential client owns an in-memory cache and invokes two lifecycle
//! hooks around every access to it. This crate keeps that in-memory cache
//! synchronized with a durable backing store:
//!
//! - [`TokenCacheStore`] - the backing-store contract (load / persist / remove)
//! - [`CacheSynchronizer`] - the before/after-access hook implementation
//! - [`ClientTokenCache`] - the view over the client-held in-memory cache
//! - [`InMemoryTokenStore`] - process-local backing store with absolute expiry
//! - [`SessionTokenStore`] - web-session-backed store with serialized I/O
//!
//! Distributed (Redis) and relational (Postgres) stores live in the
//! `sigil-cache-redis` and `sigil-cache-postgres` crates.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sigil_cache::{CacheSynchronizer, InMemoryTokenStore, TokenCacheState};
//!
//! let store = Arc::new(InMemoryTokenStore::with_defaults());
//! let sync = CacheSynchronizer::for_application("my-client-id", store)?;
//!
//! let mut cache = TokenCacheState::new();
//! sync.before_access(&mut cache).await?;
//! // ... the credential client reads/writes its cache ...
//! sync.after_access(&mut cache).await?;
//! ```
//!
//! Absence of a stored entry is never an error: it yields an empty in-memory
//! cache, which the credential client interprets as "re-authenticate".

mod error;
pub mod key;
mod memory;
mod session;
mod state;
mod store;
mod sync;

pub use error::CacheError;
pub use memory::{InMemoryTokenStore, MemoryStoreConfig};
pub use session::{MemorySession, SessionState, SessionTokenStore};
pub use state::{ClientTokenCache, TokenCacheState};
pub use store::TokenCacheStore;
pub use sync::{CacheSynchronizer, ClaimsProvider};

/// Type alias for a cache result.
pub type CacheResult<T> = Result<T, CacheError>;

/// Type alias for a shared store trait object.
pub type DynTokenCacheStore = std::sync::Arc<dyn TokenCacheStore>;
