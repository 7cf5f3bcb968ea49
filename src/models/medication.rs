use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Collection, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

impl Medication {
    pub fn from_new(id: String, new: NewMedication) -> Self {
        Self {
            id,
            name: new.name,
            dosage: new.dosage,
            frequency: new.frequency,
        }
    }
}

impl Record for Medication {
    const COLLECTION: Collection = Collection::Medications;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Medication as submitted, before an id is assigned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewMedication {
    #[validate(length(min = 1, message = "Medication name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Dosage is required"))]
    pub dosage: String,
    #[validate(length(min = 1, message = "Frequency is required"))]
    pub frequency: String,
}

impl NewMedication {
    pub fn new(name: impl Into<String>, dosage: impl Into<String>, frequency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            frequency: frequency.into(),
        }
    }
}
