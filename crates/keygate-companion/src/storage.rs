//! Browser-local storage seam.
//!
//! The companion persists everything that must survive the redirect round
//! trip under the fixed [`keys`]. Only the session mutates storage; callers
//! read through the session's accessors.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::Result;

/// Storage key names.
pub mod keys {
    /// Access token.
    pub const TOKEN: &str = "token";
    /// Refresh token.
    pub const REFRESH_TOKEN: &str = "refresh-token";
    /// Access token expiry, unix seconds.
    pub const TOKEN_EXPIRES: &str = "token-expires";
    /// Identity token.
    pub const ID_TOKEN: &str = "id-token";
    /// PKCE verifier of the pending login.
    pub const CODE_VERIFIER: &str = "code-verifier";
    /// CSRF nonce of the pending login.
    pub const STATE: &str = "state";
    /// Where to go once the login completes.
    pub const REDIRECT_URL_AFTER_LOGIN: &str = "redirect-url-after-login";
    /// Callback URL sent to the provider.
    pub const CALLBACK_URL: &str = "callback-url";
    /// Event to fire on the next page load.
    pub const TRIGGER_EVENT_AFTER_REDIRECT: &str = "trigger-event-after-redirect";

    /// Keys holding token material.
    pub const TOKEN_KEYS: [&str; 4] = [TOKEN, REFRESH_TOKEN, TOKEN_EXPIRES, ID_TOKEN];
}

/// String key/value storage that survives page loads.
pub trait Storage {
    /// Read `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `key`.
    ///
    /// # Errors
    ///
    /// Returns `CompanionError::Storage` if the write is refused.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is a no-op.
    fn remove(&self, key: &str);

    /// Remove every key.
    fn clear(&self);
}

/// In-memory [`Storage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Stored key names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.values.borrow_mut().remove(key);
    }

    fn clear(&self) {
        self.values.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_crud() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.set(keys::TOKEN, "a").unwrap();
        storage.set(keys::STATE, "s").unwrap();
        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("a"));
        assert_eq!(storage.keys(), vec!["state", "token"]);

        storage.remove(keys::TOKEN);
        storage.remove(keys::TOKEN);
        assert!(storage.get(keys::TOKEN).is_none());

        storage.clear();
        assert!(storage.is_empty());
    }
}
