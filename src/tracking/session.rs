//! Login session and inactivity timeout.
//!
//! Instead of two independently scheduled timers, the manager keeps the
//! instant of the last activity and compares the elapsed time against two
//! thresholds whenever it is polled or sees an event. Every reset restarts
//! both deadlines from zero.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{KeyValueStore, StorageKeys};
use crate::error::{Error, Result, StoreError};
use crate::models::UserSession;
use crate::tracking::clock::Clock;
use crate::tracking::validation::{validate_login_username, validate_user_session};

pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(60);

const EVENT_CAPACITY: usize = 16;

/// Total idle time before logout, and how long before it the warning shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityPolicy {
    timeout: Duration,
    warning_lead: Duration,
}

impl InactivityPolicy {
    pub fn new(timeout: Duration, warning_lead: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Policy("timeout must be greater than zero".into()));
        }
        if warning_lead >= timeout {
            return Err(Error::Policy(format!(
                "warning lead ({}s) must be shorter than the timeout ({}s)",
                warning_lead.as_secs(),
                timeout.as_secs()
            )));
        }
        Ok(Self {
            timeout,
            warning_lead,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Idle time after which the warning is shown
    pub fn warning_after(&self) -> Duration {
        self.timeout - self.warning_lead
    }
}

impl Default for InactivityPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_INACTIVITY_TIMEOUT,
            warning_lead: DEFAULT_WARNING_LEAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Active,
    WarningShown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(Presence),
}

/// Input that counts as the user being present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    PointerMove,
    PointerDown,
    KeyDown,
    TouchStart,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Explicit,
    Inactivity,
}

/// State change produced by a poll or an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    WarningShown,
    LoggedOut(LogoutReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(UserSession),
    WarningShown,
    Resumed,
    LoggedOut(LogoutReason),
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: StorageKeys,
    policy: InactivityPolicy,
    user: Option<UserSession>,
    last_activity: Option<DateTime<Utc>>,
    warning_shown: bool,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Starts logged in when the store holds a readable session, logged out
    /// otherwise. An unreadable session is removed.
    pub fn restore(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        keys: StorageKeys,
        policy: InactivityPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut manager = Self {
            store,
            clock,
            keys,
            policy,
            user: None,
            last_activity: None,
            warning_shown: false,
            events,
        };

        if let Some(session) = manager.read_persisted() {
            info!(username = %session.username, "restored session");
            manager.user = Some(session);
            manager.last_activity = Some(manager.clock.now());
        }
        manager
    }

    fn read_persisted(&self) -> Option<UserSession> {
        let key = self.keys.session();
        let raw = match self.store.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                return None;
            }
        };

        let parsed = serde_json::from_str::<Value>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|value| validate_user_session(&value).map_err(|e| e.to_string()));
        match parsed {
            Ok(session) => Some(session),
            Err(reason) => {
                warn!(%reason, "discarding unreadable session");
                if let Err(e) = self.store.remove(&key) {
                    warn!(error = %e, "failed to remove unreadable session");
                }
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.user, self.warning_shown) {
            (None, _) => SessionState::LoggedOut,
            (Some(_), false) => SessionState::LoggedIn(Presence::Active),
            (Some(_), true) => SessionState::LoggedIn(Presence::WarningShown),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    pub fn show_warning(&self) -> bool {
        self.warning_shown
    }

    pub fn policy(&self) -> InactivityPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Instant at which the warning is (or was) due
    pub fn warning_at(&self) -> Option<DateTime<Utc>> {
        self.deadline(self.policy.warning_after())
    }

    /// Instant at which the session expires
    pub fn logout_at(&self) -> Option<DateTime<Utc>> {
        self.deadline(self.policy.timeout())
    }

    fn deadline(&self, after: Duration) -> Option<DateTime<Utc>> {
        let last = self.last_activity.filter(|_| self.user.is_some())?;
        let after = chrono::Duration::from_std(after).ok()?;
        Some(last + after)
    }

    /// Creates and persists a session for `username`, replacing any current one.
    #[instrument(skip(self))]
    pub fn login(&mut self, username: &str) -> Result<UserSession> {
        let username = validate_login_username(&Value::String(username.to_string()))?;
        let session = UserSession::new(username, self.clock.now());

        let key = self.keys.session();
        let encoded = serde_json::to_string(&session).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.store.set(&key, &encoded)?;

        self.user = Some(session.clone());
        self.reset_window();
        info!(username = %session.username, "logged in");
        self.notify(SessionEvent::LoggedIn(session.clone()));
        Ok(session)
    }

    /// Ends the session immediately.
    pub fn logout(&mut self) {
        self.end_session(LogoutReason::Explicit);
    }

    /// Records user activity. Deadlines that already passed are applied
    /// first, so a late event cannot revive an expired session.
    pub fn record_activity(&mut self, signal: ActivitySignal) -> Option<SessionTransition> {
        if let Some(transition @ SessionTransition::LoggedOut(_)) = self.poll() {
            return Some(transition);
        }
        if self.user.is_none() {
            return None;
        }
        debug!(?signal, "activity");
        self.resume();
        None
    }

    /// Hides the warning and restarts the inactivity window.
    pub fn dismiss_warning(&mut self) -> Option<SessionTransition> {
        if let Some(transition @ SessionTransition::LoggedOut(_)) = self.poll() {
            return Some(transition);
        }
        if self.user.is_none() {
            return None;
        }
        self.resume();
        None
    }

    /// Applies whichever deadline has passed since the last activity.
    pub fn poll(&mut self) -> Option<SessionTransition> {
        let (Some(warning_at), Some(logout_at)) = (self.warning_at(), self.logout_at()) else {
            return None;
        };
        let now = self.clock.now();

        if now >= logout_at {
            info!(username = ?self.username(), "logging out after inactivity");
            self.end_session(LogoutReason::Inactivity);
            return Some(SessionTransition::LoggedOut(LogoutReason::Inactivity));
        }
        if now >= warning_at && !self.warning_shown {
            self.warning_shown = true;
            debug!(%logout_at, "inactivity warning shown");
            self.notify(SessionEvent::WarningShown);
            return Some(SessionTransition::WarningShown);
        }
        None
    }

    fn resume(&mut self) {
        let was_warning = self.warning_shown;
        self.reset_window();
        if was_warning {
            self.notify(SessionEvent::Resumed);
        }
    }

    fn reset_window(&mut self) {
        self.last_activity = Some(self.clock.now());
        self.warning_shown = false;
    }

    fn end_session(&mut self, reason: LogoutReason) {
        if let Err(e) = self.store.remove(&self.keys.session()) {
            error!(error = %e, "failed to clear persisted session");
        }
        let was_logged_in = self.user.take().is_some();
        self.last_activity = None;
        self.warning_shown = false;
        if was_logged_in {
            info!(?reason, "logged out");
            self.notify(SessionEvent::LoggedOut(reason));
        }
    }

    fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, MockKeyValueStore};
    use crate::tracking::clock::ManualClock;
    use chrono::TimeZone;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                clock: Arc::new(ManualClock::new(
                    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
                )),
            }
        }

        fn manager(&self) -> SessionManager {
            SessionManager::restore(
                self.store.clone(),
                self.clock.clone(),
                StorageKeys::default(),
                InactivityPolicy::default(),
            )
        }

        fn idle(&self, minutes: i64) {
            self.clock.advance(chrono::Duration::minutes(minutes));
        }
    }

    #[test]
    fn starts_logged_out_without_session() {
        let fx = Fixture::new();
        let manager = fx.manager();
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert!(manager.logout_at().is_none());
    }

    #[test]
    fn login_persists_session() {
        let fx = Fixture::new();
        let mut manager = fx.manager();

        let session = manager.login("alice").unwrap();
        assert_eq!(session.login_time, fx.clock.now());
        assert_eq!(manager.state(), SessionState::LoggedIn(Presence::Active));

        let raw = fx.store.get("session").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["username"], "alice");
        assert!(value["loginTime"].is_string());
    }

    #[test]
    fn login_rejects_short_username() {
        let fx = Fixture::new();
        let mut manager = fx.manager();

        let err = manager.login("a").unwrap_err();
        assert!(matches!(err, Error::Validation(ref e) if e.contains("username")));
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn login_fails_cleanly_when_store_rejects_write() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().returning(|_| Ok(None));
        store
            .expect_set()
            .returning(|_, _| Err(StoreError::Backend("read-only".into())));
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let mut manager = SessionManager::restore(
            Arc::new(store),
            clock,
            StorageKeys::default(),
            InactivityPolicy::default(),
        );
        assert!(matches!(manager.login("alice"), Err(Error::Store(_))));
        assert!(!manager.is_logged_in());
    }

    #[test]
    fn restores_persisted_session() {
        let fx = Fixture::new();
        fx.manager().login("alice").unwrap();

        let restored = fx.manager();
        assert_eq!(restored.username(), Some("alice"));
        assert_eq!(restored.state(), SessionState::LoggedIn(Presence::Active));
        assert_eq!(
            restored.logout_at(),
            Some(fx.clock.now() + chrono::Duration::minutes(10))
        );
    }

    #[test]
    fn corrupt_session_is_discarded() {
        let fx = Fixture::new();
        fx.store.set("session", "{\"username\":").unwrap();

        let manager = fx.manager();
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(fx.store.get("session").unwrap(), None);
    }

    #[test]
    fn session_with_wrong_shape_is_discarded() {
        let fx = Fixture::new();
        fx.store.set("session", r#"{"username":"alice"}"#).unwrap();

        assert!(!fx.manager().is_logged_in());
        assert!(fx.store.is_empty());
    }

    #[test]
    fn warning_at_nine_minutes_logout_at_ten() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();
        let mut events = manager.subscribe();

        fx.idle(8);
        assert_eq!(manager.poll(), None);

        fx.idle(1);
        assert_eq!(manager.poll(), Some(SessionTransition::WarningShown));
        assert_eq!(manager.state(), SessionState::LoggedIn(Presence::WarningShown));
        assert!(manager.show_warning());
        assert_eq!(manager.poll(), None);

        fx.idle(1);
        assert_eq!(
            manager.poll(),
            Some(SessionTransition::LoggedOut(LogoutReason::Inactivity))
        );
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert_eq!(fx.store.get("session").unwrap(), None);

        assert_eq!(events.try_recv().unwrap(), SessionEvent::WarningShown);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoggedOut(LogoutReason::Inactivity)
        );
    }

    #[test]
    fn activity_restarts_full_window() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();

        fx.idle(8);
        assert_eq!(manager.record_activity(ActivitySignal::KeyDown), None);

        fx.idle(8);
        assert_eq!(manager.poll(), None);
        assert_eq!(manager.state(), SessionState::LoggedIn(Presence::Active));
    }

    #[test]
    fn activity_during_warning_resumes() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();
        let mut events = manager.subscribe();

        fx.idle(9);
        manager.poll();
        assert!(manager.show_warning());

        manager.record_activity(ActivitySignal::Scroll);
        assert_eq!(manager.state(), SessionState::LoggedIn(Presence::Active));
        assert_eq!(
            manager.logout_at(),
            Some(fx.clock.now() + chrono::Duration::minutes(10))
        );

        fx.idle(9);
        assert_eq!(manager.poll(), Some(SessionTransition::WarningShown));

        assert_eq!(events.try_recv().unwrap(), SessionEvent::WarningShown);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::Resumed);
    }

    #[test]
    fn dismiss_warning_restarts_window() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();

        fx.idle(9);
        manager.poll();
        assert_eq!(manager.dismiss_warning(), None);
        assert!(!manager.show_warning());

        fx.idle(9);
        assert_eq!(manager.poll(), Some(SessionTransition::WarningShown));
    }

    #[test]
    fn late_activity_does_not_revive_expired_session() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();

        fx.idle(11);
        assert_eq!(
            manager.record_activity(ActivitySignal::PointerMove),
            Some(SessionTransition::LoggedOut(LogoutReason::Inactivity))
        );
        assert!(!manager.is_logged_in());
    }

    #[test]
    fn activity_while_logged_out_is_ignored() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        assert_eq!(manager.record_activity(ActivitySignal::TouchStart), None);
        assert_eq!(manager.dismiss_warning(), None);
        assert_eq!(manager.state(), SessionState::LoggedOut);
    }

    #[test]
    fn explicit_logout_clears_everything() {
        let fx = Fixture::new();
        let mut manager = fx.manager();
        manager.login("alice").unwrap();
        fx.idle(9);
        manager.poll();

        manager.logout();
        assert_eq!(manager.state(), SessionState::LoggedOut);
        assert!(!manager.show_warning());
        assert!(fx.store.is_empty());

        fx.idle(30);
        assert_eq!(manager.poll(), None);
    }

    #[test]
    fn policy_rejects_lead_not_shorter_than_timeout() {
        assert!(InactivityPolicy::new(Duration::from_secs(60), Duration::from_secs(60)).is_err());
        assert!(InactivityPolicy::new(Duration::ZERO, Duration::ZERO).is_err());

        let policy = InactivityPolicy::new(Duration::from_secs(120), Duration::from_secs(30)).unwrap();
        assert_eq!(policy.warning_after(), Duration::from_secs(90));
        assert_eq!(InactivityPolicy::default().warning_after(), Duration::from_secs(540));
    }
}
