#![forbid(unsafe_code)]

//! Keyframed animation curves with interactive editing.
//!
//! - [`CurveModel`]: registry of named [`Curve`]s, keyframe editing,
//!   evaluation and change notification.
//! - [`interp`]: linear, step, Hermite and Bezier segment math.
//! - [`Viewport`]: affine pixel <-> (frame, value) mapping.
//! - [`CurveDragger`]: press / drag / release state machine for anchors and
//!   tangent handles, including same-key collision handling.
//!
//! # Example
//!
//! ```
//! use composer_curve::{CurveDataType, CurveModel, Interpolation};
//!
//! let mut model = CurveModel::default();
//! model.add_curve("opacity", CurveDataType::Float);
//! model.insert_point("opacity", 0, 0.0, Interpolation::Linear);
//! model.insert_point("opacity", 10, 1.0, Interpolation::Linear);
//!
//! assert_eq!(model.evaluate("opacity", 5.0), Some(0.5));
//! assert_eq!(model.evaluate("opacity", 99.0), Some(1.0));
//! ```

pub mod curve;
pub mod drag;
pub mod error;
pub mod interp;
pub mod model;
pub mod point;
pub mod viewport;

pub use curve::{Curve, CurveDataType};
pub use drag::{CurveDragger, DragOutcome, DragPart, DragState, DragTarget, SameKey, hit_test};
pub use error::CurveError;
pub use model::{CurveConfig, CurveEvent, CurveModel, CurveModelState, SubscriptionId};
pub use point::{HandleType, Interpolation, Point, Side, Tangent};
pub use viewport::{Viewport, ViewportConfig};
