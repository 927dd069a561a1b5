//! Friend records.
//!
//! A friend is a name and the public key PEM its owner distributed out of
//! band. Duplicate names are allowed in the stored list; lookup returns the
//! first match. Whether duplicates are a feature (multiple keys per person)
//! or a data-integrity gap is an open question owned by the provisioning
//! flow, so the list is deliberately not deduplicated here.

use serde::{Deserialize, Serialize};

use crate::store::{self, Store, StoreError, keys};

/// One friend record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    /// Account name, as used on the relay.
    pub name: String,
    /// SPKI PEM of the friend's long-term public key.
    pub pubkey_pem: String,
}

/// The locally stored friend list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendList {
    /// Records in provisioning order.
    pub friends: Vec<Friend>,
}

impl FriendList {
    /// Public key PEM for a name. First match wins.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.friends.iter().find(|f| f.name == name).map(|f| f.pubkey_pem.as_str())
    }

    /// Distinct friend names, in first-seen order.
    pub fn distinct_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for friend in &self.friends {
            if !names.contains(&friend.name.as_str()) {
                names.push(&friend.name);
            }
        }
        names
    }

    /// Load the list from the store. An absent key is an empty list.
    pub fn load<S: Store>(store: &S) -> Result<Self, StoreError> {
        match store::get_string(store, keys::FRIENDS) {
            Ok(json) => {
                serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
            },
            Err(StoreError::NotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Persist the list to the store.
    pub fn save<S: Store>(&self, store: &S) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        store.put(keys::FRIENDS, json.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn friend(name: &str, pem: &str) -> Friend {
        Friend { name: name.into(), pubkey_pem: pem.into() }
    }

    #[test]
    fn first_match_wins_on_duplicate_names() {
        let list = FriendList {
            friends: vec![friend("bob", "pem-1"), friend("bob", "pem-2"), friend("eve", "pem-3")],
        };

        assert_eq!(list.lookup("bob"), Some("pem-1"));
        assert_eq!(list.lookup("eve"), Some("pem-3"));
        assert_eq!(list.lookup("mallory"), None);
    }

    #[test]
    fn distinct_names_preserve_first_seen_order() {
        let list = FriendList {
            friends: vec![friend("bob", "a"), friend("eve", "b"), friend("bob", "c")],
        };

        assert_eq!(list.distinct_names(), vec!["bob", "eve"]);
    }

    #[test]
    fn load_save_roundtrip() {
        let store = MemoryStore::new();
        let list = FriendList { friends: vec![friend("bob", "pem")] };

        list.save(&store).unwrap();
        assert_eq!(FriendList::load(&store).unwrap(), list);
    }

    #[test]
    fn missing_list_loads_empty() {
        let store = MemoryStore::new();
        assert_eq!(FriendList::load(&store).unwrap(), FriendList::default());
    }
}
