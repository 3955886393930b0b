//! `RocksDB` session backend.
//!
//! This module provides the `RocksBackend` implementation of the
//! `SessionBackend` trait.

use std::path::Path;
use std::sync::Arc;

use keygate_core::SessionId;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options, WriteBatch};

use crate::error::{Result, StoreError};
use crate::keys::{self, SessionKey};
use crate::schema::{all_column_families, cf};
use crate::SessionBackend;

/// RocksDB-backed session storage.
pub struct RocksBackend {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Held across the read and delete of `take`.
    take_lock: Mutex<()>,
}

impl RocksBackend {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!("Opened RocksDB session backend");

        Ok(Self {
            db: Arc::new(db),
            take_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }
}

impl SessionBackend for RocksBackend {
    fn get(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf::SESSION_VALUES)?;
        self.db
            .get_cf(&cf, keys::session_value_key(session_id, key))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn put(&self, session_id: &SessionId, key: SessionKey, value: &[u8]) -> Result<()> {
        let cf = self.cf(cf::SESSION_VALUES)?;
        self.db
            .put_cf(&cf, keys::session_value_key(session_id, key), value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn delete(&self, session_id: &SessionId, key: SessionKey) -> Result<()> {
        let cf = self.cf(cf::SESSION_VALUES)?;
        self.db
            .delete_cf(&cf, keys::session_value_key(session_id, key))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn take(&self, session_id: &SessionId, key: SessionKey) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf::SESSION_VALUES)?;
        let db_key = keys::session_value_key(session_id, key);

        let _guard = self.take_lock.lock();
        let value = self
            .db
            .get_cf(&cf, &db_key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        if value.is_some() {
            self.db
                .delete_cf(&cf, &db_key)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(value)
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let cf = self.cf(cf::SESSION_VALUES)?;

        let mut batch = WriteBatch::default();
        for key in SessionKey::ALL {
            batch.delete_cf(&cf, keys::session_value_key(session_id, key));
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (RocksBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = RocksBackend::open(dir.path()).unwrap();
        (backend, dir)
    }

    #[test]
    fn value_crud() {
        let (backend, _dir) = create_test_backend();
        let id = SessionId::generate();

        backend.put(&id, SessionKey::TokenBlob, b"blob").unwrap();
        assert_eq!(
            backend.get(&id, SessionKey::TokenBlob).unwrap().unwrap(),
            b"blob"
        );

        backend.put(&id, SessionKey::TokenBlob, b"blob-2").unwrap();
        assert_eq!(
            backend.get(&id, SessionKey::TokenBlob).unwrap().unwrap(),
            b"blob-2"
        );

        backend.delete(&id, SessionKey::TokenBlob).unwrap();
        assert!(backend.get(&id, SessionKey::TokenBlob).unwrap().is_none());
    }

    #[test]
    fn take_is_one_shot() {
        let (backend, _dir) = create_test_backend();
        let id = SessionId::generate();

        backend.put(&id, SessionKey::OAuthState, b"s").unwrap();
        assert!(backend.take(&id, SessionKey::OAuthState).unwrap().is_some());
        assert!(backend.take(&id, SessionKey::OAuthState).unwrap().is_none());
    }

    #[test]
    fn concurrent_takes_hand_out_one_value() {
        let (backend, _dir) = create_test_backend();
        let id = SessionId::generate();

        for _ in 0..20 {
            backend.put(&id, SessionKey::OAuthState, b"state").unwrap();
            let taken = std::thread::scope(|scope| {
                let handles: Vec<_> = (0..8)
                    .map(|_| scope.spawn(|| backend.take(&id, SessionKey::OAuthState).unwrap()))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|h| h.join().unwrap())
                    .count()
            });
            assert_eq!(taken, 1);
        }
    }

    #[test]
    fn delete_session_removes_all_slots() {
        let (backend, _dir) = create_test_backend();
        let id = SessionId::generate();
        let other = SessionId::generate();

        for key in SessionKey::ALL {
            backend.put(&id, key, b"x").unwrap();
        }
        backend.put(&other, SessionKey::TokenBlob, b"y").unwrap();

        backend.delete_session(&id).unwrap();

        for key in SessionKey::ALL {
            assert!(backend.get(&id, key).unwrap().is_none());
        }
        assert!(backend.get(&other, SessionKey::TokenBlob).unwrap().is_some());
    }

    #[test]
    fn survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = SessionId::generate();

        {
            let backend = RocksBackend::open(dir.path()).unwrap();
            backend.put(&id, SessionKey::TokenBlob, b"persisted").unwrap();
        }

        let backend = RocksBackend::open(dir.path()).unwrap();
        assert_eq!(
            backend.get(&id, SessionKey::TokenBlob).unwrap().unwrap(),
            b"persisted"
        );
    }
}
