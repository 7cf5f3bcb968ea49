//! Per-user medication and vitals collections.
//!
//! A store is scoped to the logged-in username (or to nobody). Switching the
//! user switches the storage key and reloads. Every mutation persists the full
//! list, then notifies subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::db::{KeyValueStore, StorageKeys};
use crate::error::StoreError;
use crate::models::{Medication, NewMedication, Record, VitalSigns, VitalSignsInput};
use crate::tracking::clock::Clock;
use crate::tracking::ids::IdGenerator;

const EVENT_CAPACITY: usize = 64;

/// Change notification for a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionEvent {
    Loaded { count: usize },
    Added { id: String },
    Removed { id: String },
}

/// Loaded records of one collection, bound to the key of the current user.
pub struct RecordList<R: Record> {
    store: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    username: Option<String>,
    records: Vec<R>,
    loading: bool,
    events: broadcast::Sender<CollectionEvent>,
}

impl<R: Record> RecordList<R> {
    /// Creates an unloaded list; `is_loading` stays true until `load` runs.
    pub fn new(store: Arc<dyn KeyValueStore>, keys: StorageKeys, username: Option<&str>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            keys,
            username: username.map(str::to_string),
            records: Vec::new(),
            loading: true,
            events,
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn storage_key(&self) -> Option<String> {
        self.username
            .as_deref()
            .map(|u| self.keys.collection(R::COLLECTION, u))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.events.subscribe()
    }

    /// Rescopes to `username` and reloads. A no-op when the user is unchanged
    /// and the list is already loaded.
    pub fn set_user(&mut self, username: Option<&str>) {
        if !self.loading && self.username.as_deref() == username {
            return;
        }
        self.username = username.map(str::to_string);
        self.load();
    }

    /// Reads the collection for the current user. Absent or unreadable data
    /// yields an empty collection.
    #[instrument(skip(self), fields(collection = R::COLLECTION.namespace(), user = ?self.username))]
    pub fn load(&mut self) {
        self.records = match self.storage_key() {
            None => Vec::new(),
            Some(key) => self.read(&key),
        };
        R::normalize(&mut self.records);
        self.loading = false;
        debug!(count = self.records.len(), "collection loaded");
        self.notify(CollectionEvent::Loaded {
            count: self.records.len(),
        });
    }

    fn read(&self, key: &str) -> Vec<R> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "failed to read collection, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(key, error = %e, "discarding unparseable collection");
                Vec::new()
            }
        }
    }

    /// Persists `updated` as the whole collection and adopts it on success.
    /// `event` is sent only after the write, and only when given.
    pub fn commit(
        &mut self,
        updated: Vec<R>,
        event: Option<CollectionEvent>,
    ) -> Result<(), StoreError> {
        let Some(key) = self.storage_key() else {
            return Ok(());
        };
        let encoded = serde_json::to_string(&updated).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.store.set(&key, &encoded)?;
        self.records = updated;
        if let Some(event) = event {
            self.notify(event);
        }
        Ok(())
    }

    fn notify(&self, event: CollectionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Medication list of the current user
pub struct MedicationStore {
    list: RecordList<Medication>,
    ids: Arc<dyn IdGenerator>,
}

impl MedicationStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        ids: Arc<dyn IdGenerator>,
        username: Option<&str>,
    ) -> Self {
        Self {
            list: RecordList::new(store, keys, username),
            ids,
        }
    }

    /// Creates the store and performs the initial load.
    pub fn mount(
        store: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        ids: Arc<dyn IdGenerator>,
        username: Option<&str>,
    ) -> Self {
        let mut medications = Self::new(store, keys, ids, username);
        medications.load();
        medications
    }

    pub fn list(&self) -> &[Medication] {
        self.list.records()
    }

    pub fn is_loading(&self) -> bool {
        self.list.is_loading()
    }

    pub fn username(&self) -> Option<&str> {
        self.list.username()
    }

    pub fn load(&mut self) {
        self.list.load();
    }

    pub fn set_user(&mut self, username: Option<&str>) {
        self.list.set_user(username);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.list.subscribe()
    }

    /// Appends a medication with a fresh id. Returns `None` when nobody is
    /// logged in.
    #[instrument(skip(self, medication), fields(user = ?self.list.username()))]
    pub fn add(&mut self, medication: NewMedication) -> Result<Option<Medication>, StoreError> {
        if self.list.username().is_none() {
            return Ok(None);
        }
        let created = Medication::from_new(self.ids.next_id(), medication);
        let mut updated = self.list.records().to_vec();
        updated.push(created.clone());
        self.list.commit(
            updated,
            Some(CollectionEvent::Added {
                id: created.id.clone(),
            }),
        )?;
        debug!(id = %created.id, "medication added");
        Ok(Some(created))
    }

    /// Removes the medication with `id`, returning whether one was present.
    #[instrument(skip(self), fields(user = ?self.list.username()))]
    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.list.username().is_none() {
            return Ok(false);
        }
        let before = self.list.records().len();
        let updated: Vec<Medication> = self
            .list
            .records()
            .iter()
            .filter(|m| m.id() != id)
            .cloned()
            .collect();
        let removed = updated.len() != before;
        let event = removed.then(|| CollectionEvent::Removed { id: id.to_string() });
        self.list.commit(updated, event)?;
        debug!(removed, "medication remove");
        Ok(removed)
    }
}

/// Vitals log of the current user, most recent first
pub struct VitalsStore {
    list: RecordList<VitalSigns>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl VitalsStore {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        username: Option<&str>,
    ) -> Self {
        Self {
            list: RecordList::new(store, keys, username),
            ids,
            clock,
        }
    }

    pub fn mount(
        store: Arc<dyn KeyValueStore>,
        keys: StorageKeys,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        username: Option<&str>,
    ) -> Self {
        let mut vitals = Self::new(store, keys, ids, clock, username);
        vitals.load();
        vitals
    }

    pub fn list(&self) -> &[VitalSigns] {
        self.list.records()
    }

    pub fn latest(&self) -> Option<&VitalSigns> {
        self.list.records().first()
    }

    pub fn is_loading(&self) -> bool {
        self.list.is_loading()
    }

    pub fn username(&self) -> Option<&str> {
        self.list.username()
    }

    pub fn load(&mut self) {
        self.list.load();
    }

    pub fn set_user(&mut self, username: Option<&str>) {
        self.list.set_user(username);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.list.subscribe()
    }

    /// Logs a reading stamped with the current time.
    #[instrument(skip(self, input), fields(user = ?self.list.username()))]
    pub fn add(&mut self, input: VitalSignsInput) -> Result<Option<VitalSigns>, StoreError> {
        if self.list.username().is_none() {
            return Ok(None);
        }
        let created = VitalSigns::from_input(self.ids.next_id(), self.clock.now(), input);
        let mut updated = self.list.records().to_vec();
        // Front of the list unless the clock went backwards
        let at = updated.partition_point(|v| v.timestamp > created.timestamp);
        updated.insert(at, created.clone());
        self.list.commit(
            updated,
            Some(CollectionEvent::Added {
                id: created.id.clone(),
            }),
        )?;
        debug!(id = %created.id, "vitals logged");
        Ok(Some(created))
    }
}
