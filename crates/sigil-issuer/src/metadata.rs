//! Instance-discovery metadata fetching and caching.
//!
//! The identity platform publishes a well-known document listing clusters of
//! authority hostnames that are mirrors of one another (regional and
//! sovereign clouds). The alias set for an authority host is the cluster
//! containing it, plus the host itself — self-inclusion covers custom and
//! B2C domains the global document does not list.
//!
//! # Security Considerations
//!
//! - Only HTTPS endpoints are allowed (except in tests)
//! - HTTP timeouts prevent hanging on slow endpoints
//! - Response size is limited to prevent DoS attacks

use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

/// The well-known instance-discovery endpoint for the public cloud.
pub const INSTANCE_DISCOVERY_ENDPOINT: &str = "https://login.microsoftonline.com/common/discovery/instance?api-version=1.1&authorization_endpoint=https%3A%2F%2Flogin.microsoftonline.com%2Fcommon%2Foauth2%2Fv2.0%2Fauthorize";

/// Configuration for the instance-metadata client and cache.
#[derive(Debug, Clone)]
pub struct AliasCacheConfig {
    /// The instance-discovery endpoint to fetch.
    pub endpoint: Url,

    /// Time-to-live for the cached document (default: 24 hours).
    pub ttl: Duration,

    /// HTTP request timeout (default: 10 seconds).
    pub request_timeout: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow an HTTP (non-HTTPS) endpoint.
    /// This should only be enabled for testing.
    pub allow_http: bool,
}

impl Default for AliasCacheConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(INSTANCE_DISCOVERY_ENDPOINT)
                .expect("well-known discovery endpoint is a valid URL"),
            ttl: Duration::from_secs(86400),          // 24 hours
            request_timeout: Duration::from_secs(10), // 10 seconds
            max_response_size: 1024 * 1024,           // 1 MB
            allow_http: false,
        }
    }
}

impl AliasCacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance-discovery endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Allows an HTTP (non-HTTPS) endpoint.
    ///
    /// # Warning
    ///
    /// This should only be used for testing.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Errors that can occur while fetching instance metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// A network error occurred while fetching the document.
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    Http(u16),

    /// The document could not be parsed as JSON.
    #[error("Failed to parse instance metadata: {0}")]
    Parse(String),

    /// The endpoint scheme is not allowed (must be HTTPS in production).
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// One cluster of equivalent authority hostnames.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceMetadataEntry {
    /// Hostnames that are mirrors of one another.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// The hostname the platform prefers for network calls.
    #[serde(default)]
    pub preferred_network: Option<String>,

    /// The hostname the platform prefers as a cache key.
    #[serde(default)]
    pub preferred_cache: Option<String>,
}

/// The instance-discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceDiscoveryDocument {
    /// Alias clusters.
    #[serde(default)]
    pub metadata: Vec<InstanceMetadataEntry>,
}

impl InstanceDiscoveryDocument {
    /// Returns the alias set for `host`: the cluster containing it plus the
    /// host itself. Hostnames compare case-insensitively; the returned set is
    /// lowercased.
    #[must_use]
    pub fn alias_set_for(&self, host: &str) -> HashSet<String> {
        let host = host.to_lowercase();
        let mut aliases: HashSet<String> = self
            .metadata
            .iter()
            .find(|entry| entry.aliases.iter().any(|a| a.eq_ignore_ascii_case(&host)))
            .map(|entry| entry.aliases.iter().map(|a| a.to_lowercase()).collect())
            .unwrap_or_default();
        aliases.insert(host);
        aliases
    }
}

/// Client for fetching the instance-discovery document.
pub struct InstanceMetadataClient {
    http_client: reqwest::Client,
    config: AliasCacheConfig,
}

impl InstanceMetadataClient {
    /// Creates a new client with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// practice).
    #[must_use]
    pub fn new(config: AliasCacheConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            config,
        }
    }

    /// Fetches and parses the instance-discovery document.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The endpoint is not HTTPS (unless `allow_http` is true)
    /// - The document cannot be fetched or parsed
    /// - The response exceeds the configured size limit
    pub async fn fetch(&self) -> Result<InstanceDiscoveryDocument, MetadataError> {
        self.validate_scheme()?;

        let response = self
            .http_client
            .get(self.config.endpoint.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch instance metadata: {}", e);
                MetadataError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(MetadataError::Http(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_response_size
        {
            return Err(MetadataError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let document: InstanceDiscoveryDocument = response.json().await.map_err(|e| {
            tracing::warn!("Failed to parse instance metadata: {}", e);
            MetadataError::Parse(e.to_string())
        })?;

        tracing::debug!(
            clusters = document.metadata.len(),
            "fetched instance-discovery metadata"
        );
        Ok(document)
    }

    /// Validates that the endpoint uses an allowed scheme.
    fn validate_scheme(&self) -> Result<(), MetadataError> {
        let scheme = self.config.endpoint.scheme();

        if scheme == "https" {
            return Ok(());
        }

        if scheme == "http" && self.config.allow_http {
            return Ok(());
        }

        Err(MetadataError::InvalidScheme(scheme.to_string()))
    }
}

/// Cached document entry.
struct CachedDocument {
    document: InstanceDiscoveryDocument,
    fetched_at: Instant,
}

/// TTL cache over the instance-discovery document.
///
/// The document is fetched once and served from memory until the TTL lapses;
/// all alias-set lookups in the process share one copy.
pub struct AliasCache {
    client: InstanceMetadataClient,
    cached: RwLock<Option<CachedDocument>>,
    config: AliasCacheConfig,
}

impl AliasCache {
    /// Creates a cache with the specified configuration.
    #[must_use]
    pub fn new(config: AliasCacheConfig) -> Self {
        let client = InstanceMetadataClient::new(config.clone());
        Self {
            client,
            cached: RwLock::new(None),
            config,
        }
    }

    /// Creates a cache with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(AliasCacheConfig::default())
    }

    /// Gets the document, fetching it if the cache is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch is needed and fails.
    pub async fn get(&self) -> Result<InstanceDiscoveryDocument, MetadataError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref()
                && entry.fetched_at.elapsed() < self.config.ttl
            {
                tracing::trace!("instance metadata cache hit");
                return Ok(entry.document.clone());
            }
        }

        self.refresh().await
    }

    /// Forces a fetch and updates the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn refresh(&self) -> Result<InstanceDiscoveryDocument, MetadataError> {
        let document = self.client.fetch().await?;

        let mut cached = self.cached.write().await;
        *cached = Some(CachedDocument {
            document: document.clone(),
            fetched_at: Instant::now(),
        });

        Ok(document)
    }

    /// Drops the cached document, forcing the next `get` to fetch.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
        tracing::debug!("invalidated instance metadata cache");
    }

    /// Returns the alias set for `host` from the (possibly freshly fetched)
    /// document.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch is needed and fails.
    pub async fn alias_set_for(&self, host: &str) -> Result<HashSet<String>, MetadataError> {
        Ok(self.get().await?.alias_set_for(host))
    }
}
