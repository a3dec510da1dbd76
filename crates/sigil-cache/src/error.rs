//! Error types for token-cache persistence.

/// Errors that can occur during token-cache store operations.
///
/// A missing entry is not an error anywhere in this crate: stores return
/// `Ok(None)` and the synchronizer clears the in-memory cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A required configuration value was missing or invalid. Raised at
    /// construction time, never at access time.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Payload serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store could not be reached or the operation failed in
    /// transit. Propagated to the caller untouched; retry policy lives with
    /// the backing-store client.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// An optimistic-concurrency write lost its bounded retry.
    #[error("Concurrency conflict: {message}")]
    Conflict {
        /// Description of the conflicting write.
        message: String,
    },

    /// The web session could not be loaded or committed.
    #[error("Session error: {message}")]
    Session {
        /// Description of the session failure.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Session` error.
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if this is a concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
