#![forbid(unsafe_code)]

//! Registry of named curves and their editing operations.
//!
//! [`CurveModel`] owns every [`Curve`]; collaborators refer to curves by
//! name only. All editing goes through the model so observers hear about
//! each change as a [`CurveEvent`].
//!
//! # Invariants
//!
//! 1. Curve names are unique.
//! 2. A curve never stays empty: deleting its last point removes it.
//! 3. Outside a drag, key frames within a curve are strictly increasing.
//!
//! # Failure Modes
//!
//! Unknown curves or key frames are an expected outcome of speculative UI
//! lookups: queries return `None`, mutators return `false`/`None`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::curve::{Curve, CurveDataType};
use crate::interp::{DEFAULT_SAMPLE_STEP, convert_handle};
use crate::point::{HandleType, Interpolation, Point, Side, Tangent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for curve evaluation and editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Parametric step for spline sampling (default: 0.001).
    pub sample_step: f64,
    /// Frame offset of the handles of a newly inserted point (default: 1.0).
    pub default_handle_frames: f64,
    /// Pick radius for anchors and handles, in pixels (default: 6.0).
    pub hit_radius_px: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            sample_step: DEFAULT_SAMPLE_STEP,
            default_handle_frames: 1.0,
            hit_radius_px: 6.0,
        }
    }
}

impl CurveConfig {
    /// Describe every out-of-range field. Empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(self.sample_step.is_finite() && self.sample_step > 0.0 && self.sample_step <= 1.0) {
            errors.push(format!(
                "curve.sample_step must be in (0, 1], got {}",
                self.sample_step
            ));
        }
        if !(self.default_handle_frames.is_finite() && self.default_handle_frames >= 0.0) {
            errors.push(format!(
                "curve.default_handle_frames must be >= 0, got {}",
                self.default_handle_frames
            ));
        }
        if !(self.hit_radius_px.is_finite() && self.hit_radius_px >= 0.0) {
            errors.push(format!(
                "curve.hit_radius_px must be >= 0, got {}",
                self.hit_radius_px
            ));
        }
        errors
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A change made to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveEvent {
    CurveAdded { name: String },
    CurveRemoved { name: String },
    PointInserted { curve: String, key_frame: i32 },
    PointRemoved { curve: String, key_frame: i32 },
    /// Value, interpolation, handles or key frame of a point changed.
    PointChanged { curve: String, key_frame: i32 },
    /// Several points of a curve changed at once.
    CurveChanged { name: String },
    /// The whole registry was replaced by [`CurveModel::restore`].
    Restored,
}

/// Handle returned by [`CurveModel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(&CurveEvent)>;

/// Serializable copy of every curve in a model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveModelState {
    pub curves: Vec<Curve>,
}

// ---------------------------------------------------------------------------
// CurveModel
// ---------------------------------------------------------------------------

/// Owner of all curves in an editing session.
pub struct CurveModel {
    curves: BTreeMap<String, Curve>,
    config: CurveConfig,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for CurveModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveModel")
            .field("curves", &self.curves.len())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for CurveModel {
    fn default() -> Self {
        Self::new(CurveConfig::default())
    }
}

impl CurveModel {
    #[must_use]
    pub fn new(config: CurveConfig) -> Self {
        Self {
            curves: BTreeMap::new(),
            config,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CurveConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: CurveConfig) {
        self.config = config;
    }

    // --- Registry ----------------------------------------------------------

    /// Register an empty curve. False if the name is taken.
    pub fn add_curve(&mut self, name: &str, data_type: CurveDataType) -> bool {
        if self.curves.contains_key(name) {
            return false;
        }
        self.curves
            .insert(name.to_string(), Curve::new(name, data_type));
        tracing::debug!(message = "curve.add", curve = name);
        self.emit(&CurveEvent::CurveAdded {
            name: name.to_string(),
        });
        true
    }

    #[must_use]
    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.get(name)
    }

    /// Direct access to a curve's points, bypassing observers.
    pub fn curve_mut(&mut self, name: &str) -> Option<&mut Curve> {
        self.curves.get_mut(name)
    }

    pub fn remove_curve(&mut self, name: &str) -> Option<Curve> {
        let curve = self.curves.remove(name)?;
        tracing::debug!(message = "curve.remove", curve = name);
        self.emit(&CurveEvent::CurveRemoved {
            name: name.to_string(),
        });
        Some(curve)
    }

    /// Curve names in sorted order.
    pub fn curve_names(&self) -> impl Iterator<Item = &str> {
        self.curves.keys().map(String::as_str)
    }

    /// All curves in name order.
    pub fn curves(&self) -> impl Iterator<Item = &Curve> {
        self.curves.values()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.curves.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    // --- Points ------------------------------------------------------------

    /// Insert a keyframe. False if the curve is unknown or `key_frame` is
    /// already occupied.
    pub fn insert_point(
        &mut self,
        curve: &str,
        key_frame: i32,
        value: f64,
        interpolation: Interpolation,
    ) -> bool {
        let handle_frames = self.config.default_handle_frames;
        let Some(c) = self.curves.get_mut(curve) else {
            return false;
        };
        if !c.insert(Point::new(key_frame, value, interpolation, handle_frames)) {
            return false;
        }
        tracing::debug!(message = "curve.point.insert", curve, key_frame, value);
        self.emit(&CurveEvent::PointInserted {
            curve: curve.to_string(),
            key_frame,
        });
        true
    }

    /// Remove a keyframe. Removing the last point also removes the curve.
    pub fn delete_point(&mut self, curve: &str, key_frame: i32) -> Option<Point> {
        let c = self.curves.get_mut(curve)?;
        let index = c.point_index(key_frame)?;
        let point = c.remove(index);
        let now_empty = c.is_empty();
        tracing::debug!(message = "curve.point.delete", curve, key_frame);
        self.emit(&CurveEvent::PointRemoved {
            curve: curve.to_string(),
            key_frame,
        });
        if now_empty {
            self.remove_curve(curve);
        }
        Some(point)
    }

    pub fn set_value(&mut self, curve: &str, key_frame: i32, value: f64) -> bool {
        self.update_point(curve, key_frame, |p| p.value = value)
    }

    pub fn set_handle_type(&mut self, curve: &str, key_frame: i32, handle_type: HandleType) -> bool {
        self.update_point(curve, key_frame, |p| p.handle_type = handle_type)
    }

    /// Replace both handle offsets. Each handle is kept on its own side of
    /// the anchor.
    pub fn set_tangents(&mut self, curve: &str, key_frame: i32, left: Tangent, right: Tangent) -> bool {
        self.update_point(curve, key_frame, |p| {
            p.left = left.clamped_to(Side::Left);
            p.right = right.clamped_to(Side::Right);
        })
    }

    /// Change how the segment starting at `key_frame` is interpolated.
    ///
    /// Switching to a spline kind re-encodes the segment's two handles (this
    /// point's right, the next point's left) from the last spline kind the
    /// segment used, so a Bezier segment parked on Linear comes back with
    /// the same shape. Switching to Linear or Step leaves the handles alone.
    pub fn set_interpolation(&mut self, curve: &str, key_frame: i32, kind: Interpolation) -> bool {
        let Some(c) = self.curves.get_mut(curve) else {
            return false;
        };
        let Some(i) = c.point_index(key_frame) else {
            return false;
        };
        let points = c.points_mut();
        let from = points[i].interpolation;
        if from == kind {
            return true;
        }
        let encoded = points[i].handle_kind;
        if kind.uses_handles() && encoded != kind {
            if let Some(next_key) = points.get(i + 1).map(|n| n.key_frame) {
                let span = f64::from(next_key) - f64::from(key_frame);
                points[i].right = convert_handle(encoded, kind, points[i].right, span, Side::Right);
                points[i + 1].left =
                    convert_handle(encoded, kind, points[i + 1].left, span, Side::Left);
            }
            points[i].handle_kind = kind;
        }
        points[i].interpolation = kind;
        tracing::debug!(
            message = "curve.point.interpolation",
            curve,
            key_frame,
            from = ?from,
            to = ?kind
        );
        self.emit(&CurveEvent::PointChanged {
            curve: curve.to_string(),
            key_frame,
        });
        true
    }

    /// Value of `curve` at `frame`. `None` for an unknown curve.
    #[must_use]
    pub fn evaluate(&self, curve: &str, frame: f64) -> Option<f64> {
        self.curves.get(curve)?.evaluate(frame, self.config.sample_step)
    }

    // --- State -------------------------------------------------------------

    /// Copy of every curve, for undo or persistence.
    #[must_use]
    pub fn snapshot(&self) -> CurveModelState {
        CurveModelState {
            curves: self.curves.values().cloned().collect(),
        }
    }

    /// Replace every curve with `state`.
    pub fn restore(&mut self, state: CurveModelState) {
        self.curves = state
            .curves
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect();
        tracing::debug!(message = "curve.restore", curves = self.curves.len());
        self.emit(&CurveEvent::Restored);
    }

    // --- Observers ---------------------------------------------------------

    pub fn subscribe(&mut self, observer: impl Fn(&CurveEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    pub(crate) fn emit(&self, event: &CurveEvent) {
        for (_, observer) in &self.observers {
            observer(event);
        }
    }

    /// Put a whole curve back (drag cancel).
    pub(crate) fn replace_curve(&mut self, curve: Curve) {
        let name = curve.name().to_string();
        self.curves.insert(name.clone(), curve);
        self.emit(&CurveEvent::CurveChanged { name });
    }

    fn update_point(&mut self, curve: &str, key_frame: i32, f: impl FnOnce(&mut Point)) -> bool {
        let Some(point) = self
            .curves
            .get_mut(curve)
            .and_then(|c| c.point_mut(key_frame))
        else {
            return false;
        };
        f(point);
        self.emit(&CurveEvent::PointChanged {
            curve: curve.to_string(),
            key_frame,
        });
        true
    }
}
