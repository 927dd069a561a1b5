//! Redb-backed durable store.
//!
//! A single table of string keys to byte values. Redb's ACID write
//! transactions give us the per-key atomic `put` and the all-or-nothing
//! `delete_batch` the logout sequence relies on.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use super::{Store, StoreError};

/// Table: client state
/// Key: store key string
/// Value: raw bytes (PEM, JSON, or secret material depending on the key)
const STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

/// Durable store backed by Redb. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(|e| StoreError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(STATE).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Store for RedbStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Io(e.to_string()))?;
        let table = txn.open_table(STATE).map_err(|e| StoreError::Io(e.to_string()))?;

        match table.get(key).map_err(|e| StoreError::Io(e.to_string()))? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(StoreError::NotFound { key: key.to_string() }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(STATE).map_err(|e| StoreError::Io(e.to_string()))?;
            table.insert(key, value).map_err(|e| StoreError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }

    fn delete_batch(&self, keys: &[&str]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(STATE).map_err(|e| StoreError::Io(e.to_string()))?;
            for key in keys {
                table.remove(*key).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| StoreError::Io(e.to_string()))?;

        Ok(())
    }
}
