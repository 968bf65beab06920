#![forbid(unsafe_code)]

//! Composer public facade crate.
//!
//! Re-exports the undo engine ([`composer_undo`]) and the curve model
//! ([`composer_curve`]), and composes them into an [`EditorSession`] that
//! records document and curve edits under one history.
//!
//! ```
//! use composer::prelude::*;
//!
//! let registry = TypeRegistry::new().with_type("Light", [("intensity", Value::Double(1.0))]);
//! let mut session = EditorSession::with_default_config(PropertyTree::new(registry)).unwrap();
//!
//! session.add_curve("intensity", CurveDataType::Float).unwrap();
//! session.insert_point("intensity", 0, 0.0, Interpolation::Linear).unwrap();
//! session.insert_point("intensity", 24, 1.0, Interpolation::Linear).unwrap();
//! assert_eq!(session.evaluate("intensity", 12.0), Some(0.5));
//!
//! session.undo().unwrap();
//! assert_eq!(session.evaluate("intensity", 12.0), Some(0.0));
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::EditorConfig;
pub use error::{ConfigError, SessionError};
pub use logging::LoggingConfig;
pub use session::EditorSession;

// --- Undo re-exports -------------------------------------------------------

pub use composer_undo::{
    AuxState, Change, Document, DocumentError, DocumentSnapshot, ObjectId, PropertyPath,
    PropertyTree, StepReport, TypeRegistry, UndoConfig, UndoEngine, UndoError, Value,
};

// --- Curve re-exports ------------------------------------------------------

pub use composer_curve::{
    Curve, CurveConfig, CurveDataType, CurveDragger, CurveError, CurveEvent, CurveModel,
    CurveModelState, DragOutcome, DragPart, DragTarget, HandleType, Interpolation, Point, Tangent, Viewport,
    ViewportConfig,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        CurveDataType, CurveModel, Document, DragPart, DragTarget, EditorConfig, EditorSession,
        HandleType, Interpolation, ObjectId, PropertyTree, SessionError, Tangent, TypeRegistry,
        UndoEngine, Value,
    };

    pub use crate::{curve, undo};
}

pub use composer_curve as curve;
pub use composer_undo as undo;
