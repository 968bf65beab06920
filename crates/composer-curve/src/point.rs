#![forbid(unsafe_code)]

//! Keyframes and their tangent handles.
//!
//! A [`Point`] anchors a curve at an integer key frame. Its handles are
//! stored as [`Tangent`] offsets from the anchor in (frame, value) space, so
//! moving the anchor carries both handles along.
//!
//! The segment between `p[i]` and `p[i + 1]` is shaped by
//! `p[i].interpolation`, `p[i].right` and `p[i + 1].left`. The two handles
//! are stored in the encoding of `p[i].handle_kind`, the last spline kind the
//! segment used:
//!
//! ```text
//! Bezier   control point offset h          canonical (±d/3, ±slope·d/3)
//! Hermite  tangent vector h·d              canonical (±1,   ±slope)
//! ```
//!
//! where `d` is the segment frame length. A segment switched to Linear or
//! Step keeps its handles and their encoding, so a later switch to either
//! spline kind converts from what the handles actually hold.

use serde::{Deserialize, Serialize};

/// How the segment starting at a point is interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    /// Hold the left value until the next key.
    Step,
    Hermite,
    Bezier,
}

impl Interpolation {
    /// True for the spline kinds whose shape depends on handles.
    #[must_use]
    pub const fn uses_handles(self) -> bool {
        matches!(self, Self::Hermite | Self::Bezier)
    }
}

/// Whether editing one handle mirrors the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandleType {
    /// Handles stay collinear through the anchor.
    #[default]
    Aligned,
    /// Handles move independently.
    Vector,
}

/// Which handle of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// `-1.0` for the left handle, `1.0` for the right one.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Handle offset from its anchor, in (frame, value) units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tangent {
    pub frame: f64,
    pub value: f64,
}

impl Tangent {
    /// Zero-length handle.
    pub const ZERO: Self = Self {
        frame: 0.0,
        value: 0.0,
    };

    #[must_use]
    pub const fn new(frame: f64, value: f64) -> Self {
        Self { frame, value }
    }

    /// Horizontal handle of the given frame offset.
    #[must_use]
    pub const fn flat(frame: f64) -> Self {
        Self { frame, value: 0.0 }
    }

    /// Value change per frame along the handle.
    ///
    /// Degenerate handles (no frame extent, or non-finite components) have
    /// slope 0.
    #[must_use]
    pub fn slope(self) -> f64 {
        if self.frame == 0.0 {
            return 0.0;
        }
        let slope = self.value / self.frame;
        if slope.is_finite() { slope } else { 0.0 }
    }

    /// Force the handle onto its own side of the anchor.
    #[must_use]
    pub fn clamped_to(self, side: Side) -> Self {
        let frame = match side {
            Side::Left => self.frame.min(0.0),
            Side::Right => self.frame.max(0.0),
        };
        Self { frame, ..self }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.frame.hypot(self.value)
    }
}

/// A keyframe with tangent handles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub key_frame: i32,
    pub value: f64,
    pub interpolation: Interpolation,
    pub left: Tangent,
    pub right: Tangent,
    pub handle_type: HandleType,
    /// Spline encoding of `right` and the next point's `left`. Always
    /// Hermite or Bezier.
    #[serde(default = "default_handle_kind")]
    pub handle_kind: Interpolation,
}

fn default_handle_kind() -> Interpolation {
    Interpolation::Bezier
}

impl Point {
    /// Create a point with flat handles `handle_frames` away on each side.
    ///
    /// The handles are encoded for `interpolation` when it is a spline kind
    /// and for Bezier otherwise.
    #[must_use]
    pub fn new(key_frame: i32, value: f64, interpolation: Interpolation, handle_frames: f64) -> Self {
        let extent = handle_frames.abs();
        Self {
            key_frame,
            value,
            interpolation,
            left: Tangent::flat(-extent),
            right: Tangent::flat(extent),
            handle_type: HandleType::Aligned,
            handle_kind: if interpolation.uses_handles() {
                interpolation
            } else {
                default_handle_kind()
            },
        }
    }

    /// Anchor position as `(frame, value)`.
    #[must_use]
    pub fn anchor(&self) -> (f64, f64) {
        (f64::from(self.key_frame), self.value)
    }

    /// The handle offset on `side`.
    #[must_use]
    pub fn handle(&self, side: Side) -> Tangent {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn handle_mut(&mut self, side: Side) -> &mut Tangent {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Absolute handle position as `(frame, value)`.
    #[must_use]
    pub fn handle_position(&self, side: Side) -> (f64, f64) {
        let t = self.handle(side);
        (f64::from(self.key_frame) + t.frame, self.value + t.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_degenerate_handle_is_zero() {
        assert_eq!(Tangent::ZERO.slope(), 0.0);
        assert_eq!(Tangent::new(0.0, 5.0).slope(), 0.0);
        assert_eq!(Tangent::new(2.0, 1.0).slope(), 0.5);
        assert_eq!(Tangent::new(-2.0, -1.0).slope(), 0.5);
    }

    #[test]
    fn clamp_keeps_handles_on_their_side() {
        let t = Tangent::new(1.5, 2.0);
        assert_eq!(t.clamped_to(Side::Right), t);
        assert_eq!(t.clamped_to(Side::Left), Tangent::new(0.0, 2.0));
    }

    #[test]
    fn new_point_has_flat_symmetric_handles() {
        let p = Point::new(4, 2.0, Interpolation::Bezier, 1.0);
        assert_eq!(p.left, Tangent::flat(-1.0));
        assert_eq!(p.right, Tangent::flat(1.0));
        assert_eq!(p.handle_position(Side::Left), (3.0, 2.0));
        assert_eq!(p.handle_position(Side::Right), (5.0, 2.0));
        assert_eq!(p.handle_type, HandleType::Aligned);
        assert_eq!(p.handle_kind, Interpolation::Bezier);
        let h = Point::new(4, 2.0, Interpolation::Hermite, 1.0);
        assert_eq!(h.handle_kind, Interpolation::Hermite);
        assert_eq!(Point::new(4, 2.0, Interpolation::Step, 1.0).handle_kind, Interpolation::Bezier);
    }

    #[test]
    fn older_json_without_handle_kind_reads_as_bezier() {
        let json = r#"{"key_frame":3,"value":1.5,"interpolation":"Linear",
            "left":{"frame":-1.0,"value":0.0},"right":{"frame":1.0,"value":0.0},
            "handle_type":"Vector"}"#;
        let p: Point = serde_json::from_str(json).unwrap();
        assert_eq!(p.handle_kind, Interpolation::Bezier);
        assert_eq!(p.handle_type, HandleType::Vector);
    }
}
