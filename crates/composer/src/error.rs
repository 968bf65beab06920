#![forbid(unsafe_code)]

//! Error types for the session facade.

use composer_curve::CurveError;
use composer_undo::UndoError;

/// Errors returned by [`EditorSession`](crate::EditorSession) operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Restoring the document failed.
    #[error(transparent)]
    Undo(#[from] UndoError),

    /// A drag call arrived in the wrong drag state.
    #[error(transparent)]
    Drag(#[from] CurveError),

    /// The curve registry could not be stored with, or read back from, an
    /// undo entry.
    #[error("curve state encoding failed: {0}")]
    AuxState(#[source] serde_json::Error),
}

/// Errors that can occur when loading an [`EditorConfig`](crate::EditorConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// Parsed, but one or more fields are out of range.
    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
