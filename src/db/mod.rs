//! Storage module for HealthTracka
//!
//! A synchronous string key-value store standing in for browser local storage,
//! plus the key layout shared by the session and the per-user collections.

use crate::error::StoreError;
use crate::models::Collection;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous get/set/remove by string key.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Key for one user's collection: `<prefix><namespace>_<username>`.
pub fn storage_key(prefix: &str, collection: Collection, username: &str) -> String {
    format!("{}{}_{}", prefix, collection.namespace(), username)
}

/// Key layout for a store, optionally namespaced by an application prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn session(&self) -> String {
        format!("{}session", self.prefix)
    }

    pub fn collection(&self, collection: Collection, username: &str) -> String {
        storage_key(&self.prefix, collection, username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_documented_keys() {
        let keys = StorageKeys::default();
        assert_eq!(keys.session(), "session");
        assert_eq!(keys.collection(Collection::Medications, "alice"), "medications_alice");
        assert_eq!(keys.collection(Collection::Vitals, "alice"), "vitals_alice");
    }

    #[test]
    fn prefix_applies_to_every_key() {
        let keys = StorageKeys::new("healthtracka_");
        assert_eq!(keys.session(), "healthtracka_session");
        assert_eq!(
            keys.collection(Collection::Vitals, "bob"),
            "healthtracka_vitals_bob"
        );
    }

    #[test]
    fn users_and_collections_get_disjoint_keys() {
        let alice = storage_key("", Collection::Medications, "alice");
        let bob = storage_key("", Collection::Medications, "bob");
        let alice_vitals = storage_key("", Collection::Vitals, "alice");
        assert_ne!(alice, bob);
        assert_ne!(alice, alice_vitals);
    }
}
