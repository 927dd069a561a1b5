//! Identity and session store.
//!
//! Trait-based abstraction over a local key-value store. The trait is
//! synchronous and deliberately small: `get`, per-key atomic `put`, and an
//! atomic multi-key `delete_batch` (logout clears the auth token and session
//! state together, all or nothing). One process per identity; no concurrent
//! writers are assumed.

mod memory;
mod redb;

use thiserror::Error;

pub use self::{memory::MemoryStore, redb::RedbStore};

/// Well-known store keys.
pub mod keys {
    /// PKCS#8 PEM of the long-term identity private key.
    pub const PRIVATE_KEY: &str = "private-key";
    /// The local user's account name.
    pub const USERNAME: &str = "own-username";
    /// JSON-serialized friend list.
    pub const FRIENDS: &str = "friend-list";
    /// Current auth token from the login flow.
    pub const AUTH_TOKEN: &str = "auth-token";
    /// JSON-serialized metadata of the active session.
    pub const SESSION_META: &str = "session-metadata";
    /// Shared secret of the active session.
    pub const SESSION_SECRET: &str = "session-secret";
}

/// Errors from store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key has no value.
    #[error("key not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// Underlying storage failure.
    #[error("store I/O error: {0}")]
    Io(String),

    /// A stored record could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Local key-value store contract.
///
/// Implementations must be `Clone` (shared via `Arc` internally) so the
/// state machine and the runtime can both hold a handle.
pub trait Store: Clone + Send + Sync + 'static {
    /// Read a value. Absent keys are `StoreError::NotFound`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write a value. Atomic per key; overwrites silently.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a set of keys atomically. Missing keys are not an error.
    fn delete_batch(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Read a value and decode it as UTF-8.
pub fn get_string<S: Store>(store: &S, key: &str) -> Result<String, StoreError> {
    let bytes = store.get(key)?;
    String::from_utf8(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn check_contract<S: Store>(store: &S) {
        // get on a missing key
        assert_eq!(
            store.get("absent"),
            Err(StoreError::NotFound { key: "absent".into() })
        );

        // put / get / overwrite
        store.put("k", b"v1").unwrap();
        assert_eq!(store.get("k").unwrap(), b"v1");
        store.put("k", b"v2").unwrap();
        assert_eq!(store.get("k").unwrap(), b"v2");

        // batch delete removes everything named, tolerates missing keys
        store.put("a", b"1").unwrap();
        store.put("b", b"2").unwrap();
        store.delete_batch(&["a", "b", "never-existed"]).unwrap();
        assert!(store.get("a").is_err());
        assert!(store.get("b").is_err());
        assert_eq!(store.get("k").unwrap(), b"v2");
    }

    #[test]
    fn memory_store_contract() {
        check_contract(&MemoryStore::new());
    }

    #[test]
    fn redb_store_contract() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        check_contract(&store);
    }

    #[test]
    fn redb_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.put(keys::AUTH_TOKEN, b"tok").unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get(keys::AUTH_TOKEN).unwrap(), b"tok");
    }

    #[test]
    fn get_string_decodes_utf8() {
        let store = MemoryStore::new();
        store.put(keys::USERNAME, "alice".as_bytes()).unwrap();
        assert_eq!(get_string(&store, keys::USERNAME).unwrap(), "alice");

        store.put("binary", &[0xFF, 0xFE]).unwrap();
        assert!(matches!(
            get_string(&store, "binary"),
            Err(StoreError::Serialization(_))
        ));
    }
}
