#![forbid(unsafe_code)]

//! Subscriber setup for hosts that do not install their own.
//!
//! Libraries in this workspace only emit through `tracing`; nothing is
//! printed until a subscriber is installed. [`init`] installs a `fmt`
//! subscriber filtered by [`LoggingConfig::filter`], overridden by the
//! `COMPOSER_LOG` environment variable:
//!
//! ```text
//! COMPOSER_LOG=composer_undo=debug,composer_curve=trace my-editor
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides [`LoggingConfig::filter`].
pub const LOG_ENV: &str = "COMPOSER_LOG";

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive (default: `"info"`).
    pub filter: String,
    /// Emit JSON lines. Needs the `tracing-json` feature; ignored otherwise.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Describe every invalid field. Empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        match EnvFilter::try_new(&self.filter) {
            Ok(_) => Vec::new(),
            Err(err) => vec![format!("logging.filter '{}' is invalid: {err}", self.filter)],
        }
    }

    /// The effective filter: `COMPOSER_LOG` if set and valid, else the
    /// configured directive, else `info`.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_new(&self.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Returns false if a global subscriber was already installed, in which
/// case the existing one is left untouched.
pub fn init(config: &LoggingConfig) -> bool {
    let installed = install(config.env_filter(), config.json);
    if installed {
        tracing::debug!(message = "logging.init", filter = %config.filter, json = config.json);
    }
    installed
}

#[cfg(feature = "tracing-json")]
fn install(filter: EnvFilter, json: bool) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

#[cfg(not(feature = "tracing-json"))]
fn install(filter: EnvFilter, json: bool) -> bool {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed && json {
        tracing::warn!(message = "logging.json_unavailable");
    }
    installed
}
