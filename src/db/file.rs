use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::StoreError;

type Document = BTreeMap<String, String>;

/// Store persisted as a single JSON object of string values on disk.
///
/// A missing file reads as an empty store; a corrupt one is reported by
/// `get` and replaced by the next write. Writes replace the whole document
/// through a temporary file and a rename, so a crash mid-write leaves the
/// previous document intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Document::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_document(&self, document: &Document) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(document).map_err(|source| StoreError::Encode {
            key: self.path.display().to_string(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!(path = %self.path.display(), keys = document.len(), "store document written");
        Ok(())
    }

    fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Document) -> bool,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut document, corrupt) = match self.read_document() {
            Err(StoreError::Corrupt { path, source }) => {
                warn!(path = %path.display(), error = %source, "replacing corrupt store document");
                (Document::new(), true)
            }
            other => (other?, false),
        };
        if apply(&mut document) || corrupt {
            self.write_document(&document)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|document| {
            document.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|document| document.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("store.json"))
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.get("session").unwrap(), None);
        assert!(store.remove("session").is_ok());
        assert!(!store.path().exists());
    }

    #[test]
    fn values_survive_reopening() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_in(&dir);
            store.set("session", r#"{"username":"alice"}"#).unwrap();
            store.set("medications_alice", "[]").unwrap();
        }

        let store = store_in(&dir);
        assert_eq!(
            store.get("session").unwrap().as_deref(),
            Some(r#"{"username":"alice"}"#)
        );
        assert_eq!(store.get("medications_alice").unwrap().as_deref(), Some("[]"));

        store.remove("session").unwrap();
        assert_eq!(store.get("session").unwrap(), None);
        assert_eq!(store.get("medications_alice").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn corrupt_document_is_reported_on_read() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.get("session"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn write_replaces_corrupt_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{garbage").unwrap();

        store.set("session", "{}").unwrap();
        assert_eq!(store.get("session").unwrap().as_deref(), Some("{}"));

        std::fs::write(store.path(), "{garbage").unwrap();
        store.remove("session").unwrap();
        assert_eq!(store.get("session").unwrap(), None);
    }
}
