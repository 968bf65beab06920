#![forbid(unsafe_code)]

//! Interactive keyframe and handle dragging.
//!
//! [`CurveDragger`] turns a press / move / release pointer sequence into
//! edits of one point:
//!
//! ```text
//!           press(target)         drag_to(x, y)
//!   Idle ─────────────────▶ Pressed ─────────────▶ Dragging ──┐ drag_to
//!    ▲                         │                      │  ◀─────┘
//!    │        release → None   │                      │ release → DragOutcome
//!    └─────────────────────────┴──────────────────────┘ cancel  → restore
//! ```
//!
//! # Invariants
//!
//! 1. Every update converts the pointer pixel position to the domain through
//!    the [`Viewport`]; pixel deltas are never accumulated.
//! 2. Dragging an anchor onto an occupied key frame never deletes anything
//!    mid-drag. The collision is held as a pending [`SameKey`] and resolved
//!    on release, where the dragged point wins.
//! 3. A handle never crosses to the other side of its anchor.
//! 4. `release` and `cancel` always return to `Idle`.

use crate::curve::{Curve, CurveDataType};
use crate::error::CurveError;
use crate::model::{CurveEvent, CurveModel};
use crate::point::{HandleType, Point, Side, Tangent};
use crate::viewport::Viewport;

/// Which part of a point a press landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragPart {
    Anchor,
    LeftHandle,
    RightHandle,
}

impl DragPart {
    fn side(self) -> Option<Side> {
        match self {
            Self::Anchor => None,
            Self::LeftHandle => Some(Side::Left),
            Self::RightHandle => Some(Side::Right),
        }
    }
}

/// The point part being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragTarget {
    pub curve: String,
    /// Current key frame of the dragged point (follows anchor moves).
    pub key_frame: i32,
    pub part: DragPart,
}

impl DragTarget {
    #[must_use]
    pub fn new(curve: impl Into<String>, key_frame: i32, part: DragPart) -> Self {
        Self {
            curve: curve.into(),
            key_frame,
            part,
        }
    }
}

/// A pending same-key collision, named after the displaced neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameKey {
    /// The dragged point sits on the previous point's key frame.
    SameWithLastKey,
    /// The dragged point sits on the next point's key frame.
    SameWithNextKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Pressed {
        target: DragTarget,
    },
    Dragging {
        target: DragTarget,
        pending: Option<SameKey>,
    },
}

/// Net effect of a committed drag, one undo entry's worth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome {
    /// `"move point"`, `"merge point"`, `"move left handle"` or
    /// `"move right handle"`.
    pub description: &'static str,
    pub curve: String,
    pub key_frame: i32,
}

/// Drag lifecycle for one curve editor.
#[derive(Debug, Clone, Default)]
pub struct CurveDragger {
    state: DragState,
    /// Index of the dragged point; key frames may collide mid-drag.
    index: usize,
    /// The curve as it was at press time, for cancel.
    original: Option<Curve>,
}

impl CurveDragger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// True while pressed or dragging.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Start a drag on `target`.
    ///
    /// Returns `Ok(false)` when the target point does not exist.
    pub fn press(&mut self, model: &CurveModel, target: DragTarget) -> Result<bool, CurveError> {
        if let DragState::Pressed { target: active } | DragState::Dragging { target: active, .. } =
            &self.state
        {
            return Err(CurveError::DragInProgress {
                curve: active.curve.clone(),
            });
        }
        let Some(curve) = model.curve(&target.curve) else {
            return Ok(false);
        };
        let Some(index) = curve.point_index(target.key_frame) else {
            return Ok(false);
        };
        tracing::debug!(
            message = "curve.drag.press",
            curve = %target.curve,
            key_frame = target.key_frame,
            part = ?target.part
        );
        self.index = index;
        self.original = Some(curve.clone());
        self.state = DragState::Pressed { target };
        Ok(true)
    }

    /// Move the dragged part under the pointer at pixel `(x, y)`.
    ///
    /// Returns `Ok(false)` (and goes idle) if the dragged point vanished
    /// from the model or was shifted by an edit made outside the drag.
    pub fn drag_to(
        &mut self,
        model: &mut CurveModel,
        viewport: &Viewport,
        x: f64,
        y: f64,
    ) -> Result<bool, CurveError> {
        let (mut target, mut pending) = match &self.state {
            DragState::Idle => return Err(CurveError::NotPressed),
            DragState::Pressed { target } => (target.clone(), None),
            DragState::Dragging { target, pending } => (target.clone(), *pending),
        };
        let (frame, value) = viewport.to_domain(x, y);

        let Some(curve) = model
            .curve_mut(&target.curve)
            .filter(|c| holds_key(c, self.index, target.key_frame))
        else {
            tracing::debug!(message = "curve.drag.lost", curve = %target.curve);
            self.reset();
            return Ok(false);
        };
        let value = match curve.data_type() {
            CurveDataType::Float => value,
            CurveDataType::Int => value.round(),
        };

        match target.part.side() {
            None => {
                // Saturating cast; NaN lands on frame 0.
                let key_frame = frame.round() as i32;
                let (index, same) = move_anchor(curve.points_mut(), self.index, key_frame, value);
                self.index = index;
                target.key_frame = key_frame;
                pending = same;
            }
            Some(side) => {
                let point = &mut curve.points_mut()[self.index];
                drag_handle(point, side, frame, value, viewport);
            }
        }

        tracing::trace!(
            message = "curve.drag.update",
            curve = %target.curve,
            key_frame = target.key_frame,
            pending = ?pending
        );
        model.emit(&CurveEvent::PointChanged {
            curve: target.curve.clone(),
            key_frame: target.key_frame,
        });
        self.state = DragState::Dragging { target, pending };
        Ok(true)
    }

    /// Finish the drag.
    ///
    /// A pending same-key collision is resolved here by deleting the
    /// displaced neighbour. Returns `None` when nothing moved.
    pub fn release(&mut self, model: &mut CurveModel) -> Option<DragOutcome> {
        let state = std::mem::take(&mut self.state);
        self.original = None;
        let DragState::Dragging { target, pending } = state else {
            return None;
        };
        let curve = model
            .curve_mut(&target.curve)
            .filter(|c| holds_key(c, self.index, target.key_frame))?;

        if let Some(same) = pending {
            let displaced = match same {
                SameKey::SameWithLastKey => self.index.checked_sub(1),
                SameKey::SameWithNextKey => Some(self.index + 1),
            };
            if let Some(displaced) = displaced.filter(|&d| d < curve.len()) {
                let removed = curve.remove(displaced);
                tracing::debug!(
                    message = "curve.drag.merge",
                    curve = %target.curve,
                    key_frame = removed.key_frame
                );
                model.emit(&CurveEvent::PointRemoved {
                    curve: target.curve.clone(),
                    key_frame: removed.key_frame,
                });
            }
        }

        let description = match target.part {
            DragPart::Anchor if pending.is_some() => "merge point",
            DragPart::Anchor => "move point",
            DragPart::LeftHandle => "move left handle",
            DragPart::RightHandle => "move right handle",
        };
        tracing::debug!(
            message = "curve.drag.commit",
            description,
            curve = %target.curve,
            key_frame = target.key_frame
        );
        Some(DragOutcome {
            description,
            curve: target.curve,
            key_frame: target.key_frame,
        })
    }

    /// Abandon the drag, restoring the curve as it was at press time.
    ///
    /// Returns false if no drag was active.
    pub fn cancel(&mut self, model: &mut CurveModel) -> bool {
        let state = std::mem::take(&mut self.state);
        let original = self.original.take();
        match state {
            DragState::Idle => false,
            DragState::Pressed { .. } => true,
            DragState::Dragging { target, .. } => {
                tracing::debug!(message = "curve.drag.cancel", curve = %target.curve);
                if let Some(curve) = original {
                    model.replace_curve(curve);
                }
                true
            }
        }
    }

    fn reset(&mut self) {
        self.state = DragState::Idle;
        self.original = None;
    }
}

/// True if the point at `index` still sits at `key_frame`.
fn holds_key(curve: &Curve, index: usize, key_frame: i32) -> bool {
    curve
        .points()
        .get(index)
        .is_some_and(|p| p.key_frame == key_frame)
}

/// Move `points[index]` to `key_frame`, keeping the list ordered.
///
/// Returns the point's new index and any collision with a neighbour.
fn move_anchor(
    points: &mut [Point],
    index: usize,
    key_frame: i32,
    value: f64,
) -> (usize, Option<SameKey>) {
    points[index].key_frame = key_frame;
    points[index].value = value;

    let mut i = index;
    while i > 0 && points[i - 1].key_frame > key_frame {
        points.swap(i - 1, i);
        i -= 1;
    }
    while i + 1 < points.len() && points[i + 1].key_frame < key_frame {
        points.swap(i, i + 1);
        i += 1;
    }

    let same = if i > 0 && points[i - 1].key_frame == key_frame {
        Some(SameKey::SameWithLastKey)
    } else if i + 1 < points.len() && points[i + 1].key_frame == key_frame {
        Some(SameKey::SameWithNextKey)
    } else {
        None
    };
    (i, same)
}

/// Put the `side` handle under the pointer and mirror the other one for
/// aligned handles.
fn drag_handle(point: &mut Point, side: Side, frame: f64, value: f64, viewport: &Viewport) {
    let (anchor_frame, anchor_value) = point.anchor();
    let offset = Tangent::new(frame - anchor_frame, value - anchor_value).clamped_to(side);
    *point.handle_mut(side) = offset;

    if point.handle_type != HandleType::Aligned {
        return;
    }
    // Mirrored in pixel space: the opposite handle keeps its on-screen
    // length and points the other way.
    let opposite = side.opposite();
    let (ox, oy) = viewport.offset_to_pixel(point.handle(opposite));
    let length = ox.hypot(oy);
    let (dx, dy) = viewport.offset_to_pixel(offset);
    let dragged = dx.hypot(dy);
    let (ux, uy) = if dragged > f64::EPSILON {
        (dx / dragged, dy / dragged)
    } else {
        // Zero-length handle: neutral horizontal direction.
        (side.sign(), 0.0)
    };
    *point.handle_mut(opposite) = viewport
        .offset_to_domain(-ux * length, -uy * length)
        .clamped_to(opposite);
}

/// Find the anchor or handle nearest to pixel `(x, y)` within `radius`.
///
/// Handles are only pickable where they shape a spline segment: a point's
/// right handle when its own interpolation uses handles, its left handle
/// when the previous point's does.
#[must_use]
pub fn hit_test(
    model: &CurveModel,
    viewport: &Viewport,
    x: f64,
    y: f64,
    radius: f64,
) -> Option<DragTarget> {
    let mut best: Option<(f64, DragTarget)> = None;
    for curve in model.curves() {
        let points = curve.points();
        for (i, p) in points.iter().enumerate() {
            let left_shown = i
                .checked_sub(1)
                .is_some_and(|j| points[j].interpolation.uses_handles());
            let right_shown = p.interpolation.uses_handles() && i + 1 < points.len();
            let candidates = [
                Some((DragPart::Anchor, p.anchor())),
                left_shown.then(|| (DragPart::LeftHandle, p.handle_position(Side::Left))),
                right_shown.then(|| (DragPart::RightHandle, p.handle_position(Side::Right))),
            ];
            for (part, (frame, value)) in candidates.into_iter().flatten() {
                let (px, py) = viewport.to_pixel(frame, value);
                let distance = (px - x).hypot(py - y);
                if distance <= radius && best.as_ref().is_none_or(|(d, _)| distance < *d) {
                    best = Some((distance, DragTarget::new(curve.name(), p.key_frame, part)));
                }
            }
        }
    }
    best.map(|(_, target)| target)
}
