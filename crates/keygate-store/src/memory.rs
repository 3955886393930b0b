//! In-memory session backend.

use std::collections::HashMap;

use keygate_core::SessionId;
use parking_lot::RwLock;

use crate::error::Result;
use crate::keys::SessionKey;
use crate::SessionBackend;

/// Process-local session storage.
///
/// Values live as long as the process; nothing is evicted.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<(SessionId, SessionKey), Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SessionBackend for MemoryBackend {
    fn get(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        Ok(self.values.read().get(&(*session_id, key)).cloned())
    }

    fn put(&self, session_id: &SessionId, key: SessionKey, value: &[u8]) -> Result<()> {
        self.values
            .write()
            .insert((*session_id, key), value.to_vec());
        Ok(())
    }

    fn delete(&self, session_id: &SessionId, key: SessionKey) -> Result<()> {
        self.values.write().remove(&(*session_id, key));
        Ok(())
    }

    fn take(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        Ok(self.values.write().remove(&(*session_id, key)))
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        self.values.write().retain(|(id, _), _| id != session_id);
        Ok(())
    }
}
