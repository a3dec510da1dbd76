//! The in-memory credential cache as seen by the synchronizer.

/// Mutable view over the credential client's in-memory token cache, handed to
/// the synchronizer around each access.
///
/// The owning client (the token-acquisition library) holds the actual cache;
/// this trait exposes exactly what the before/after-access hooks need:
/// whole-state replacement, a serialized snapshot, and the "content changed"
/// signal that gates persistence.
pub trait ClientTokenCache: Send {
    /// Replaces the entire in-memory state with `bytes`.
    ///
    /// `None` clears the cache (no stored entry exists). This is a replace,
    /// never a merge, and must not raise the changed signal.
    fn replace(&mut self, bytes: Option<&[u8]>);

    /// Serializes the current in-memory state.
    fn snapshot(&self) -> Vec<u8>;

    /// Returns `true` if the content changed since the signal was last reset.
    fn has_state_changed(&self) -> bool;

    /// Resets the changed signal after a successful persist.
    fn reset_state_changed(&mut self);
}

/// A plain byte-buffer implementation of [`ClientTokenCache`].
///
/// Suitable for tests and for credential clients that expose their serialized
/// cache state directly rather than through their own cache object.
#[derive(Debug, Clone, Default)]
pub struct TokenCacheState {
    bytes: Vec<u8>,
    state_changed: bool,
}

impl TokenCacheState {
    /// Creates an empty cache state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the cache content as the owning client would after a token
    /// acquisition, raising the changed signal.
    pub fn write(&mut self, bytes: impl Into<Vec<u8>>) {
        self.bytes = bytes.into();
        self.state_changed = true;
    }

    /// Returns the current content.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns `true` if the cache holds no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ClientTokenCache for TokenCacheState {
    fn replace(&mut self, bytes: Option<&[u8]>) {
        self.bytes = bytes.map(<[u8]>::to_vec).unwrap_or_default();
    }

    fn snapshot(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    fn has_state_changed(&self) -> bool {
        self.state_changed
    }

    fn reset_state_changed(&mut self) {
        self.state_changed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_does_not_raise_changed_signal() {
        let mut state = TokenCacheState::new();
        state.replace(Some(b"blob"));
        assert_eq!(state.bytes(), b"blob");
        assert!(!state.has_state_changed());
    }

    #[test]
    fn test_replace_none_clears() {
        let mut state = TokenCacheState::new();
        state.write(b"blob".to_vec());
        state.replace(None);
        assert!(state.is_empty());
    }

    #[test]
    fn test_write_raises_changed_signal() {
        let mut state = TokenCacheState::new();
        state.write(b"blob".to_vec());
        assert!(state.has_state_changed());
        assert_eq!(state.snapshot(), b"blob");

        state.reset_state_changed();
        assert!(!state.has_state_changed());
    }
}
