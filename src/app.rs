//! Application shell tying the session to the per-user collections.
//!
//! The session decides which screen is shown. While someone is logged in, the
//! medication and vitals stores are scoped to that username; after any
//! session change they are rescoped, so each user only ever sees their own
//! collections.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use crate::config::Settings;
use crate::db::{FileStore, KeyValueStore};
use crate::error::Result;
use crate::models::{Medication, UserSession, VitalSigns};
use crate::tracking::validation::{validate_login_username, validate_medication, validate_vital_signs};
use crate::tracking::{
    ActivitySignal, Clock, IdGenerator, Inactivity, MedicationStore, SessionManager,
    SessionTransition, SystemClock, UuidGenerator, VitalsStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard { username: String },
}

pub struct HealthTracker {
    session: SessionManager,
    medications: MedicationStore,
    vitals: VitalsStore,
}

impl HealthTracker {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settings: &Settings,
    ) -> Result<Self> {
        let keys = settings.storage_keys();
        let session = SessionManager::restore(
            store.clone(),
            clock.clone(),
            keys.clone(),
            settings.inactivity_policy()?,
        );
        let username = session.username();
        let medications = MedicationStore::mount(store.clone(), keys.clone(), ids.clone(), username);
        let vitals = VitalsStore::mount(store, keys, ids, clock, username);

        Ok(Self {
            session,
            medications,
            vitals,
        })
    }

    /// Opens the file-backed store named in `settings` with the system clock.
    pub fn open(settings: &Settings) -> Result<Self> {
        info!(path = %settings.storage.path.display(), "opening store");
        let store = Arc::new(FileStore::new(settings.storage.path.clone()));
        Self::new(store, Arc::new(SystemClock), Arc::new(UuidGenerator), settings)
    }

    pub fn screen(&self) -> Screen {
        match self.session.username() {
            Some(username) => Screen::Dashboard {
                username: username.to_string(),
            },
            None => Screen::Login,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn medications(&self) -> &MedicationStore {
        &self.medications
    }

    pub fn vitals(&self) -> &VitalsStore {
        &self.vitals
    }

    /// Submits the login form (`{"username": ...}` or a bare string).
    #[instrument(skip(self, input))]
    pub fn login(&mut self, input: &Value) -> Result<UserSession> {
        let username = validate_login_username(input)?;
        let session = self.session.login(&username)?;
        self.rescope();
        Ok(session)
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.rescope();
    }

    pub fn record_activity(&mut self, signal: ActivitySignal) -> Option<SessionTransition> {
        let transition = self.session.record_activity(signal);
        self.rescope();
        transition
    }

    pub fn dismiss_warning(&mut self) -> Option<SessionTransition> {
        let transition = self.session.dismiss_warning();
        self.rescope();
        transition
    }

    pub fn poll(&mut self) -> Option<SessionTransition> {
        let transition = self.session.poll();
        self.rescope();
        transition
    }

    /// Validates and stores a medication. `Ok(None)` when logged out.
    pub fn submit_medication(&mut self, input: &Value) -> Result<Option<Medication>> {
        let medication = validate_medication(input)?;
        Ok(self.medications.add(medication)?)
    }

    pub fn remove_medication(&mut self, id: &str) -> Result<bool> {
        Ok(self.medications.remove(id)?)
    }

    /// Validates and logs vitals. `Ok(None)` when logged out.
    pub fn submit_vitals(&mut self, input: &Value) -> Result<Option<VitalSigns>> {
        let vitals = validate_vital_signs(input)?;
        Ok(self.vitals.add(vitals)?)
    }

    fn rescope(&mut self) {
        let username = self.session.username();
        self.medications.set_user(username);
        self.vitals.set_user(username);
    }
}

impl Inactivity for HealthTracker {
    fn poll_inactivity(&mut self) -> Option<SessionTransition> {
        self.poll()
    }
}
