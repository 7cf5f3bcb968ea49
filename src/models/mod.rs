//! Record types persisted by HealthTracka.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod medication;
pub mod session;
pub mod vitals;

pub use medication::{Medication, NewMedication};
pub use session::UserSession;
pub use vitals::{VitalSigns, VitalSignsInput};

/// Per-user collections kept in the key-value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Medications,
    Vitals,
}

impl Collection {
    /// Namespace used when deriving the storage key
    pub fn namespace(self) -> &'static str {
        match self {
            Collection::Medications => "medications",
            Collection::Vitals => "vitals",
        }
    }
}

/// A record that lives in one user's collection.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Restores the collection ordering after a load.
    fn normalize(_records: &mut Vec<Self>) {}
}
