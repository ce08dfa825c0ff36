//! The user/key store collaborator consumed by `key_announce` handling.

use std::collections::HashMap;
use std::sync::Mutex;

/// Persistence failure in the collaborator store. Logged by the router;
/// never affects gossip state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A user record as seen by the gossip layer.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub username: String,
    pub public_key: Option<String>,
    /// True for identities learned from the network rather than local
    /// accounts. Remote identities never merge into authenticated users.
    pub remote: bool,
}

/// Narrow interface over the hosting process's user/key persistence.
pub trait UserStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    /// Record an identity observed via gossip, keyed by username.
    fn create_remote_identity(&self, username: &str, public_key: &str) -> Result<(), StoreError>;
    fn update_public_key(&self, username: &str, public_key: &str) -> Result<(), StoreError>;
}

/// In-memory store used by the daemon binary and tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a local (non-remote) user, as account registration would.
    pub fn add_local_user(&self, username: &str, public_key: Option<&str>) {
        let mut users = self.users.lock().expect("user store lock");
        users.insert(
            username.to_owned(),
            UserRecord {
                username: username.to_owned(),
                public_key: public_key.map(str::to_owned),
                remote: false,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.users.lock().expect("user store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStore for MemoryUserStore {
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.lock().expect("user store lock");
        Ok(users.get(username).cloned())
    }

    fn create_remote_identity(&self, username: &str, public_key: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().expect("user store lock");
        users.insert(
            username.to_owned(),
            UserRecord {
                username: username.to_owned(),
                public_key: Some(public_key.to_owned()),
                remote: true,
            },
        );
        Ok(())
    }

    fn update_public_key(&self, username: &str, public_key: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().expect("user store lock");
        match users.get_mut(username) {
            Some(record) => {
                record.public_key = Some(public_key.to_owned());
                Ok(())
            }
            None => Err(StoreError::Backend(format!("no such user: {username}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_missing_user() {
        let store = MemoryUserStore::new();
        assert!(store.find_by_username("alice").expect("find").is_none());
    }

    #[test]
    fn test_local_user_roundtrip() {
        let store = MemoryUserStore::new();
        store.add_local_user("alice", Some("key-a"));

        let record = store.find_by_username("alice").expect("find").expect("record");
        assert_eq!(record.public_key.as_deref(), Some("key-a"));
        assert!(!record.remote);
    }

    #[test]
    fn test_remote_identity_is_flagged() {
        let store = MemoryUserStore::new();
        store.create_remote_identity("mallory", "key-m").expect("create");

        let record = store
            .find_by_username("mallory")
            .expect("find")
            .expect("record");
        assert!(record.remote);
    }

    #[test]
    fn test_update_public_key() {
        let store = MemoryUserStore::new();
        store.add_local_user("alice", Some("old"));
        store.update_public_key("alice", "new").expect("update");

        let record = store.find_by_username("alice").expect("find").expect("record");
        assert_eq!(record.public_key.as_deref(), Some("new"));
    }

    #[test]
    fn test_update_missing_user_fails() {
        let store = MemoryUserStore::new();
        assert!(store.update_public_key("ghost", "key").is_err());
    }
}
