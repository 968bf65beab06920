#![forbid(unsafe_code)]

//! Editor configuration as data.
//!
//! Collects every tunable of the session into one [`EditorConfig`] that can
//! be loaded from TOML or JSON at startup:
//!
//! ```toml
//! # composer.toml
//! [undo]
//! max_depth = 200
//!
//! [curve]
//! sample_step = 0.0005
//! hit_radius_px = 8.0
//!
//! [viewport]
//! frame_width = 12.0
//!
//! [logging]
//! filter = "composer_undo=debug,info"
//! ```
//!
//! Every section and field is optional; missing values take their
//! defaults, so `EditorConfig::default()` and an empty file agree.

#[cfg(feature = "config")]
use std::path::Path;

use composer_curve::{CurveConfig, ViewportConfig};
use composer_undo::UndoConfig;
use serde::{Deserialize, Serialize};

#[cfg(feature = "config")]
use crate::error::ConfigError;
use crate::logging::LoggingConfig;

/// Top-level configuration for an [`EditorSession`](crate::EditorSession).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo history limits.
    pub undo: UndoConfig,
    /// Curve sampling and editing parameters.
    pub curve: CurveConfig,
    /// Initial curve-editor view.
    pub viewport: ViewportConfig,
    pub logging: LoggingConfig,
}

impl EditorConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Validate all parameters are within acceptable ranges.
    ///
    /// Returns a list of validation errors. An empty list means the config
    /// is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.undo.max_depth == 0 {
            errors.push("undo.max_depth must be > 0".to_string());
        }
        errors.extend(self.curve.validate());
        errors.extend(self.viewport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// `self` if [`validate`](Self::validate) finds nothing, else
    /// [`ConfigError::Invalid`] with every message.
    #[cfg(feature = "config")]
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
