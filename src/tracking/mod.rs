//! Core logic: validation, collections and the session state machine.

pub mod clock;
pub mod ids;
pub mod monitor;
pub mod records;
pub mod session;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use monitor::{spawn_inactivity_monitor, Inactivity};
pub use records::{CollectionEvent, MedicationStore, RecordList, VitalsStore};
pub use session::{
    ActivitySignal, InactivityPolicy, LogoutReason, Presence, SessionEvent, SessionManager,
    SessionState, SessionTransition,
};
