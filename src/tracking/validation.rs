//! Record validators.
//!
//! Each validator takes untyped JSON as submitted by a form and returns either
//! the typed value or the per-field messages to show next to the inputs.
//! Expected failures are always returned as [`FieldErrors`]; nothing here
//! panics on bad input.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::FieldErrors;
use crate::models::{NewMedication, UserSession, VitalSignsInput};

const USERNAME_REQUIRED: &str = "Username is required";
const USERNAME_TOO_SHORT: &str = "Username must be at least 2 characters";
const USERNAME_MIN_CHARS: usize = 2;

/// Closed range accepted for one vital-sign reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalBound {
    pub field: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

impl VitalBound {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

pub const SYSTOLIC: VitalBound = VitalBound {
    field: "systolic",
    label: "Systolic",
    min: 60.0,
    max: 250.0,
};

pub const DIASTOLIC: VitalBound = VitalBound {
    field: "diastolic",
    label: "Diastolic",
    min: 40.0,
    max: 150.0,
};

pub const HEART_RATE: VitalBound = VitalBound {
    field: "heartRate",
    label: "Heart rate",
    min: 30.0,
    max: 220.0,
};

pub const WEIGHT: VitalBound = VitalBound {
    field: "weight",
    label: "Weight",
    min: 1.0,
    max: 1000.0,
};

pub const VITAL_BOUNDS: [VitalBound; 4] = [SYSTOLIC, DIASTOLIC, HEART_RATE, WEIGHT];

pub fn validate_medication(input: &Value) -> Result<NewMedication, FieldErrors> {
    let medication = NewMedication {
        name: text_field(input, "name"),
        dosage: text_field(input, "dosage"),
        frequency: text_field(input, "frequency"),
    };
    medication.validate()?;
    Ok(medication)
}

pub fn validate_vital_signs(input: &Value) -> Result<VitalSignsInput, FieldErrors> {
    let draft = VitalSignsDraft::from_json(input);
    draft.validate()?;
    match draft.readings.map(Reading::value) {
        [Some(systolic), Some(diastolic), Some(heart_rate), Some(weight)] => Ok(VitalSignsInput {
            systolic,
            diastolic,
            heart_rate,
            weight,
        }),
        // validate() reports every missing reading
        _ => Err(FieldErrors::new()),
    }
}

/// Accepts a bare username string or a login form `{"username": ...}`.
pub fn validate_login_username(input: &Value) -> Result<String, FieldErrors> {
    let form = LoginForm {
        username: match input {
            Value::String(s) => s.clone(),
            other => text_field(other, "username"),
        },
    };
    form.validate()?;
    Ok(form.username)
}

pub fn validate_user_session(input: &Value) -> Result<UserSession, FieldErrors> {
    let username = text_field(input, "username");
    let login_time = input
        .get("loginTime")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    match login_time {
        Some(login_time) => {
            let session = UserSession::new(username, login_time);
            session.validate()?;
            Ok(session)
        }
        None => {
            let mut errors = FieldErrors::new();
            if username.is_empty() {
                errors.insert("username", USERNAME_REQUIRED);
            }
            errors.insert("loginTime", "Login time must be an ISO-8601 timestamp");
            Err(errors)
        }
    }
}

// Missing and non-string values read as empty.
fn text_field(input: &Value, field: &str) -> String {
    input
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[derive(Debug, Clone)]
struct LoginForm {
    username: String,
}

impl Validate for LoginForm {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let chars = self.username.chars().count();
        let message = if chars == 0 {
            USERNAME_REQUIRED
        } else if chars < USERNAME_MIN_CHARS {
            USERNAME_TOO_SHORT
        } else {
            return Ok(());
        };

        let mut error = ValidationError::new("length");
        error.message = Some(Cow::Borrowed(message));
        error.add_param(Cow::Borrowed("min"), &USERNAME_MIN_CHARS);
        let mut errors = ValidationErrors::new();
        errors.add("username", error);
        Err(errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Reading {
    Missing,
    NotANumber,
    Value(f64),
}

impl Reading {
    fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Reading::Missing,
            Some(Value::Number(n)) => n.as_f64().map_or(Reading::NotANumber, Reading::Value),
            // Form inputs submit text
            Some(Value::String(s)) if s.is_empty() => Reading::Missing,
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Reading::Value(v),
                _ => Reading::NotANumber,
            },
            Some(_) => Reading::NotANumber,
        }
    }

    fn value(self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    fn check(self, bound: &VitalBound) -> Option<ValidationError> {
        let (code, message) = match self {
            Reading::Missing => ("required", format!("{} is required", bound.label)),
            Reading::NotANumber => ("type", format!("{} must be a number", bound.label)),
            Reading::Value(v) if bound.contains(v) => return None,
            Reading::Value(v) if v < bound.min => {
                ("range", format!("{} must be at least {}", bound.label, bound.min))
            }
            Reading::Value(_) => ("range", format!("{} must be at most {}", bound.label, bound.max)),
        };

        let mut error = ValidationError::new(code);
        error.message = Some(Cow::Owned(message));
        if code == "range" {
            error.add_param(Cow::Borrowed("min"), &bound.min);
            error.add_param(Cow::Borrowed("max"), &bound.max);
        }
        Some(error)
    }
}

/// Readings in `VITAL_BOUNDS` order
#[derive(Debug, Clone, Copy)]
struct VitalSignsDraft {
    readings: [Reading; 4],
}

impl VitalSignsDraft {
    fn from_json(input: &Value) -> Self {
        Self {
            readings: VITAL_BOUNDS.map(|bound| Reading::from_json(input.get(bound.field))),
        }
    }
}

impl Validate for VitalSignsDraft {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (reading, bound) in self.readings.iter().zip(&VITAL_BOUNDS) {
            if let Some(error) = reading.check(bound) {
                errors.add(bound.field, error);
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
