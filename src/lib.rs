//! HealthTracka core library
//!
//! Local medication and vital-sign tracking for a single user: validation,
//! per-user persistence in a key-value store, and a login session that ends
//! after a period of inactivity.

pub mod app;
pub mod db;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod tracking;

pub use app::{HealthTracker, Screen};
pub use error::{Error, FieldErrors, Result, StoreError};

/// Application configuration
pub mod config {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use serde::Deserialize;

    use crate::db::StorageKeys;
    use crate::error::Result;
    use crate::tracking::InactivityPolicy;

    #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct Settings {
        pub session: SessionSettings,
        pub storage: StorageSettings,
        pub logging: LoggingSettings,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct SessionSettings {
        pub inactivity_timeout_secs: u64,
        pub warning_lead_secs: u64,
    }

    impl Default for SessionSettings {
        fn default() -> Self {
            Self {
                inactivity_timeout_secs: 600,
                warning_lead_secs: 60,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct StorageSettings {
        pub path: PathBuf,
        /// Prepended to every key, e.g. `healthtracka_`
        pub key_prefix: String,
    }

    impl Default for StorageSettings {
        fn default() -> Self {
            Self {
                path: PathBuf::from("healthtracka.json"),
                key_prefix: String::new(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct LoggingSettings {
        pub filter: String,
        pub json: bool,
    }

    impl Default for LoggingSettings {
        fn default() -> Self {
            Self {
                filter: "info".into(),
                json: false,
            }
        }
    }

    impl Settings {
        pub fn inactivity_policy(&self) -> Result<InactivityPolicy> {
            InactivityPolicy::new(
                Duration::from_secs(self.session.inactivity_timeout_secs),
                Duration::from_secs(self.session.warning_lead_secs),
            )
        }

        pub fn storage_keys(&self) -> StorageKeys {
            StorageKeys::new(self.storage.key_prefix.clone())
        }
    }

    /// Load configuration from an optional TOML file
    pub fn load_config(path: Option<&Path>) -> Result<Settings> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::new(
                &path.to_string_lossy(),
                ::config::FileFormat::Toml,
            ));
        }

        // Override with environment variables, e.g. HEALTHTRACKA_SESSION__WARNING_LEAD_SECS
        builder = builder.add_source(
            ::config::Environment::with_prefix("HEALTHTRACKA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.inactivity_policy()?;
        Ok(settings)
    }

}
