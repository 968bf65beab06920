#![forbid(unsafe_code)]

//! Errors for interactive curve editing.
//!
//! Lookups of unknown curves or points are not errors: they return `None`
//! or `false`. Only calls made in the wrong drag state are rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    #[error("a drag on '{curve}' is already in progress")]
    DragInProgress { curve: String },

    #[error("no drag in progress")]
    NotPressed,
}
