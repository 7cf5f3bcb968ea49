use dashmap::DashMap;

use super::KeyValueStore;
use crate::error::StoreError;

/// In-process store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("session").unwrap(), None);

        store.set("session", "{}").unwrap();
        assert_eq!(store.get("session").unwrap().as_deref(), Some("{}"));

        store.set("session", "[]").unwrap();
        assert_eq!(store.get("session").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.len(), 1);

        store.remove("session").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn removing_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("nope").is_ok());
    }
}
