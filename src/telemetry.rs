//! Tracing subscriber setup for embedding applications.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured filter. Fails if a subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|e| Error::Telemetry(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::Telemetry(e.to_string()))
}
