//! Request-scoped view of one server-side session.

use std::sync::Arc;

use keygate_core::{OAuthState, SessionId, SessionRecord};
use keygate_store::{codec, SessionBackend, SessionKey};

use crate::error::Result;

/// Typed access to the OAuth state and token blob of a single session.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    session_id: SessionId,
}

impl SessionStore {
    /// Bind `backend` to `session_id`.
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>, session_id: SessionId) -> Self {
        Self {
            backend,
            session_id,
        }
    }

    /// The session this store is bound to.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Persist the pending login state, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or stored.
    pub fn save_state(&self, state: &OAuthState) -> Result<()> {
        let bytes = codec::encode(state)?;
        self.backend
            .put(&self.session_id, SessionKey::OAuthState, &bytes)?;
        Ok(())
    }

    /// Remove and return the pending login state.
    ///
    /// An undecodable state is dropped and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn take_state(&self) -> Result<Option<OAuthState>> {
        let Some(bytes) = self.backend.take(&self.session_id, SessionKey::OAuthState)? else {
            return Ok(None);
        };
        match codec::decode(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Dropping undecodable OAuth state");
                Ok(None)
            }
        }
    }

    /// Load the stored session record.
    ///
    /// An undecodable blob is deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn load_record(&self) -> Result<Option<SessionRecord>> {
        let Some(bytes) = self.backend.get(&self.session_id, SessionKey::TokenBlob)? else {
            return Ok(None);
        };
        match codec::decode(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Discarding undecodable session record");
                self.clear_record()?;
                Ok(None)
            }
        }
    }

    /// Persist a session record, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or stored.
    pub fn save_record(&self, record: &SessionRecord) -> Result<()> {
        let bytes = codec::encode(record)?;
        self.backend
            .put(&self.session_id, SessionKey::TokenBlob, &bytes)?;
        Ok(())
    }

    /// Delete the session record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn clear_record(&self) -> Result<()> {
        self.backend.delete(&self.session_id, SessionKey::TokenBlob)?;
        Ok(())
    }

    /// Delete everything stored for this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn clear(&self) -> Result<()> {
        self.backend.delete_session(&self.session_id)?;
        Ok(())
    }
}
