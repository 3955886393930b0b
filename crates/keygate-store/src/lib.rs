//! Server-side session storage for keygate.
//!
//! The authenticator never owns persistence: it reads and writes a handful of
//! values scoped to one [`SessionId`] through the [`SessionBackend`] trait.
//! Two implementations are provided:
//!
//! - [`MemoryBackend`]: process-local, the default for single-instance gateways
//! - [`RocksBackend`]: persistent, backed by `RocksDB` (feature `rocks`)
//!
//! # Layout
//!
//! Every value is addressed by `session_id || key`, where the key is one of
//! the fixed [`SessionKey`] slots. Values are opaque bytes; [`codec`] provides
//! the CBOR encoding used for typed values.
//!
//! # Example
//!
//! ```
//! use keygate_core::SessionId;
//! use keygate_store::{MemoryBackend, SessionBackend, SessionKey};
//!
//! let backend = MemoryBackend::new();
//! let session = SessionId::generate();
//!
//! backend.put(&session, SessionKey::OAuthState, b"state").unwrap();
//! assert_eq!(
//!     backend.get(&session, SessionKey::OAuthState).unwrap().as_deref(),
//!     Some(&b"state"[..])
//! );
//!
//! backend.delete_session(&session).unwrap();
//! assert!(backend.get(&session, SessionKey::OAuthState).unwrap().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codec;
pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocks")]
pub mod rocks;
#[cfg(feature = "rocks")]
pub mod schema;

pub use error::{Result, StoreError};
pub use keys::SessionKey;
pub use memory::MemoryBackend;
#[cfg(feature = "rocks")]
pub use rocks::RocksBackend;

use keygate_core::SessionId;

/// Storage for values scoped to one server-side session.
///
/// Implementations must be safe to share across request handlers; the
/// locking discipline for a single session is the host's concern.
pub trait SessionBackend: Send + Sync {
    /// Read the value stored in `key` for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn get(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>>;

    /// Store `value` in `key` for `session_id`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn put(&self, session_id: &SessionId, key: SessionKey, value: &[u8]) -> Result<()>;

    /// Remove `key` for `session_id`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn delete(&self, session_id: &SessionId, key: SessionKey) -> Result<()>;

    /// Remove and return the value in `key` for `session_id`.
    ///
    /// Of concurrent takes of one value, at most one returns it. The default
    /// reads then deletes; backends reachable from several threads override
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn take(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        let value = self.get(session_id, key)?;
        if value.is_some() {
            self.delete(session_id, key)?;
        }
        Ok(value)
    }

    /// Remove every key stored for `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        for key in SessionKey::ALL {
            self.delete(session_id, key)?;
        }
        Ok(())
    }
}

impl<B: SessionBackend + ?Sized> SessionBackend for std::sync::Arc<B> {
    fn get(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        (**self).get(session_id, key)
    }

    fn put(&self, session_id: &SessionId, key: SessionKey, value: &[u8]) -> Result<()> {
        (**self).put(session_id, key, value)
    }

    fn delete(&self, session_id: &SessionId, key: SessionKey) -> Result<()> {
        (**self).delete(session_id, key)
    }

    fn take(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        (**self).take(session_id, key)
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        (**self).delete_session(session_id)
    }
}
