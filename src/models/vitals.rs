use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Record};

/// A logged set of vital signs. Blood pressure in mmHg, heart rate in BPM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    pub id: String,
    pub systolic: f64,
    pub diastolic: f64,
    pub heart_rate: f64,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
}

impl VitalSigns {
    pub fn from_input(id: String, timestamp: DateTime<Utc>, input: VitalSignsInput) -> Self {
        Self {
            id,
            systolic: input.systolic,
            diastolic: input.diastolic,
            heart_rate: input.heart_rate,
            weight: input.weight,
            timestamp,
        }
    }

    /// Blood pressure as shown in the vitals log, e.g. `120/80`
    pub fn blood_pressure(&self) -> String {
        format!("{}/{}", self.systolic, self.diastolic)
    }
}

impl Record for VitalSigns {
    const COLLECTION: Collection = Collection::Vitals;

    fn id(&self) -> &str {
        &self.id
    }

    // Most recent first
    fn normalize(records: &mut Vec<Self>) {
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

/// Validated readings, before an id and timestamp are assigned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSignsInput {
    pub systolic: f64,
    pub diastolic: f64,
    pub heart_rate: f64,
    pub weight: f64,
}
