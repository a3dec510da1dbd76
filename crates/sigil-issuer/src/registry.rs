//! Bounded, TTL-refreshed cache of issuer validators per authority.
//!
//! One validator exists per configured authority, built from the alias set of
//! the authority's host. The registry is an injectable component constructed
//! at startup and passed by handle; entries expire on a TTL and the map is
//! capacity-bounded, so neither tests nor tenants leak state into each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use url::Url;

use crate::metadata::{AliasCache, AliasCacheConfig};
use crate::validator::{AadIssuerValidator, IssuerError};

/// Configuration for [`IssuerValidatorRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of cached validators (default: 64).
    pub capacity: usize,

    /// Lifetime of a cached validator before it is rebuilt from metadata
    /// (default: 24 hours).
    pub ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl: Duration::from_secs(86400), // 24 hours
        }
    }
}

impl RegistryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of cached validators.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the validator lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A cached validator with its creation time.
struct RegistryEntry {
    validator: Arc<AadIssuerValidator>,
    created_at: Instant,
}

impl RegistryEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Caches one [`AadIssuerValidator`] per authority.
///
/// Alias sets are immutable once built; refresh happens by entry expiry
/// rebuilding the validator from the (itself TTL-cached) instance-metadata
/// document.
pub struct IssuerValidatorRegistry {
    aliases: AliasCache,
    entries: RwLock<HashMap<String, RegistryEntry>>,
    config: RegistryConfig,
}

impl IssuerValidatorRegistry {
    /// Creates a registry over the given alias cache.
    #[must_use]
    pub fn new(aliases: AliasCache, config: RegistryConfig) -> Self {
        Self {
            aliases,
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates a registry with default configuration against the public
    /// cloud's discovery endpoint.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            AliasCache::new(AliasCacheConfig::default()),
            RegistryConfig::default(),
        )
    }

    /// Returns the validator for `authority`, building and caching it if
    /// necessary.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::InvalidArgument` if `authority` is empty or not
    /// a URL with a host, and propagates metadata-fetch failures when a
    /// validator has to be built.
    pub async fn validator_for(
        &self,
        authority: &str,
    ) -> Result<Arc<AadIssuerValidator>, IssuerError> {
        if authority.trim().is_empty() {
            return Err(IssuerError::InvalidArgument { name: "authority" });
        }
        let url =
            Url::parse(authority).map_err(|_| IssuerError::InvalidArgument { name: "authority" })?;
        let host = url
            .host_str()
            .ok_or(IssuerError::InvalidArgument { name: "authority" })?
            .to_lowercase();

        let key = authority.trim_end_matches('/').to_lowercase();

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key)
                && !entry.is_expired(self.config.ttl)
            {
                tracing::trace!(authority = %key, "issuer validator cache hit");
                return Ok(Arc::clone(&entry.validator));
            }
        }

        let alias_set = self.aliases.alias_set_for(&host).await?;
        let validator = Arc::new(AadIssuerValidator::new(alias_set));

        let mut entries = self.entries.write().await;
        let ttl = self.config.ttl;
        entries.retain(|_, entry| !entry.is_expired(ttl));
        if entries.len() >= self.config.capacity {
            // At capacity with nothing expired: drop the oldest entry.
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            {
                tracing::debug!(authority = %oldest, "evicting oldest issuer validator");
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            RegistryEntry {
                validator: Arc::clone(&validator),
                created_at: Instant::now(),
            },
        );

        Ok(validator)
    }

    /// Returns the number of cached validators.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no validators are cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
