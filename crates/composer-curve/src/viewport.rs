#![forbid(unsafe_code)]

//! Pixel <-> domain mapping for the curve editor.
//!
//! ```text
//! x = origin_x + frame * frame_width
//! y = origin_y - value * value_width      (pixel y grows downward)
//! ```
//!
//! The mapping is pure presentation state; nothing here is persisted with
//! the document.

use serde::{Deserialize, Serialize};

use crate::point::Tangent;

/// Initial scale and origin of a [`Viewport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Pixels per frame (default: 10.0).
    pub frame_width: f64,
    /// Pixels per value unit (default: 10.0).
    pub value_width: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            frame_width: 10.0,
            value_width: 10.0,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl ViewportConfig {
    /// Describe every out-of-range field. Empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, width) in [
            ("frame_width", self.frame_width),
            ("value_width", self.value_width),
        ] {
            if !(width.is_finite() && width > 0.0) {
                errors.push(format!("viewport.{name} must be > 0, got {width}"));
            }
        }
        for (name, origin) in [("origin_x", self.origin_x), ("origin_y", self.origin_y)] {
            if !origin.is_finite() {
                errors.push(format!("viewport.{name} must be finite, got {origin}"));
            }
        }
        errors
    }
}

/// Scale, origin and playhead of one curve-editor view.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub frame_width: f64,
    pub value_width: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    playhead: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(&ViewportConfig::default())
    }
}

impl Viewport {
    #[must_use]
    pub fn new(config: &ViewportConfig) -> Self {
        Self {
            frame_width: config.frame_width,
            value_width: config.value_width,
            origin_x: config.origin_x,
            origin_y: config.origin_y,
            playhead: 0,
        }
    }

    /// Pixel position of a domain point.
    #[must_use]
    pub fn to_pixel(&self, frame: f64, value: f64) -> (f64, f64) {
        (
            self.origin_x + frame * self.frame_width,
            self.origin_y - value * self.value_width,
        )
    }

    /// Domain point under a pixel position.
    #[must_use]
    pub fn to_domain(&self, x: f64, y: f64) -> (f64, f64) {
        (
            unscale(x - self.origin_x, self.frame_width),
            unscale(self.origin_y - y, self.value_width),
        )
    }

    /// Pixel vector of a handle offset.
    #[must_use]
    pub fn offset_to_pixel(&self, offset: Tangent) -> (f64, f64) {
        (
            offset.frame * self.frame_width,
            -offset.value * self.value_width,
        )
    }

    /// Handle offset of a pixel vector.
    #[must_use]
    pub fn offset_to_domain(&self, dx: f64, dy: f64) -> Tangent {
        Tangent::new(unscale(dx, self.frame_width), unscale(-dy, self.value_width))
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.origin_x += dx;
        self.origin_y += dy;
    }

    /// Scale both axes while keeping the domain point under `(x, y)` fixed.
    ///
    /// Non-positive or non-finite factors are ignored.
    pub fn zoom_about(&mut self, x: f64, y: f64, factor_x: f64, factor_y: f64) {
        let valid = |f: f64| f.is_finite() && f > 0.0;
        if !valid(factor_x) || !valid(factor_y) {
            tracing::debug!(message = "curve.viewport.zoom_rejected", factor_x, factor_y);
            return;
        }
        let (frame, value) = self.to_domain(x, y);
        self.frame_width *= factor_x;
        self.value_width *= factor_y;
        self.origin_x = x - frame * self.frame_width;
        self.origin_y = y + value * self.value_width;
    }

    #[must_use]
    pub fn playhead(&self) -> i32 {
        self.playhead
    }

    pub fn set_playhead(&mut self, frame: i32) {
        self.playhead = frame;
    }
}

/// Divide by a scale factor, degrading to 0 for a zero scale.
fn unscale(pixels: f64, scale: f64) -> f64 {
    if scale == 0.0 { 0.0 } else { pixels / scale }
}
