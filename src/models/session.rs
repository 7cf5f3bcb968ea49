use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The logged-in user. There is at most one per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    pub login_time: DateTime<Utc>,
}

impl UserSession {
    pub fn new(username: impl Into<String>, login_time: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            login_time,
        }
    }
}
