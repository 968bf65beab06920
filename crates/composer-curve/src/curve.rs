#![forbid(unsafe_code)]

//! A named animation curve.

use serde::{Deserialize, Serialize};

use crate::interp::sample_segment;
use crate::point::Point;

/// Value type carried by a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveDataType {
    #[default]
    Float,
    /// Evaluated values are rounded to the nearest integer.
    Int,
}

/// Keyframes of one animated property, ordered by key frame.
///
/// # Invariants
///
/// Key frames are strictly increasing, except transiently while a drag has
/// a pending same-key collision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    name: String,
    data_type: CurveDataType,
    points: Vec<Point>,
}

impl Curve {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: CurveDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            points: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_type(&self) -> CurveDataType {
        self.data_type
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Point at `key_frame`, if any.
    #[must_use]
    pub fn point(&self, key_frame: i32) -> Option<&Point> {
        self.point_index(key_frame).map(|i| &self.points[i])
    }

    /// Mutable access to the point at `key_frame`.
    ///
    /// Changing `key_frame` through this reference can break ordering; use
    /// the model's editing operations for that.
    pub fn point_mut(&mut self, key_frame: i32) -> Option<&mut Point> {
        self.point_index(key_frame).map(|i| &mut self.points[i])
    }

    /// Position of the point at `key_frame`.
    #[must_use]
    pub fn point_index(&self, key_frame: i32) -> Option<usize> {
        self.points.iter().position(|p| p.key_frame == key_frame)
    }

    /// First and last key frame.
    #[must_use]
    pub fn key_range(&self) -> Option<(i32, i32)> {
        Some((self.first()?.key_frame, self.last()?.key_frame))
    }

    /// Value at `frame`, sampling spline segments with parametric `step`.
    ///
    /// Frames outside the key range clamp to the first/last value; a frame
    /// landing exactly on a key returns that key's value. `None` for an
    /// empty curve.
    #[must_use]
    pub fn evaluate(&self, frame: f64, step: f64) -> Option<f64> {
        let first = self.first()?;
        let last = self.last()?;
        let value = if frame <= f64::from(first.key_frame) {
            first.value
        } else if frame >= f64::from(last.key_frame) {
            last.value
        } else {
            let i = self
                .points
                .partition_point(|p| f64::from(p.key_frame) <= frame)
                .saturating_sub(1);
            let start = &self.points[i];
            if f64::from(start.key_frame) == frame {
                start.value
            } else {
                let end = &self.points[(i + 1).min(self.points.len() - 1)];
                sample_segment(start, end, start.interpolation, frame, step)
            }
        };
        Some(match self.data_type {
            CurveDataType::Float => value,
            CurveDataType::Int => value.round(),
        })
    }

    /// Insert keeping key order. Returns false if `key_frame` is taken.
    pub(crate) fn insert(&mut self, point: Point) -> bool {
        let at = self.points.partition_point(|p| p.key_frame < point.key_frame);
        if self
            .points
            .get(at)
            .is_some_and(|p| p.key_frame == point.key_frame)
        {
            return false;
        }
        self.points.insert(at, point);
        true
    }

    pub(crate) fn remove(&mut self, index: usize) -> Point {
        self.points.remove(index)
    }

    pub(crate) fn points_mut(&mut self) -> &mut Vec<Point> {
        &mut self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::DEFAULT_SAMPLE_STEP;
    use crate::point::Interpolation;

    fn curve(points: &[(i32, f64, Interpolation)]) -> Curve {
        let mut c = Curve::new("c", CurveDataType::Float);
        for &(k, v, i) in points {
            assert!(c.insert(Point::new(k, v, i, 1.0)));
        }
        c
    }

    #[test]
    fn insert_keeps_order_and_rejects_duplicates() {
        let mut c = curve(&[(5, 0.0, Interpolation::Linear), (1, 0.0, Interpolation::Linear)]);
        assert!(c.insert(Point::new(3, 0.0, Interpolation::Linear, 1.0)));
        assert!(!c.insert(Point::new(3, 9.0, Interpolation::Linear, 1.0)));
        let keys: Vec<_> = c.points().iter().map(|p| p.key_frame).collect();
        assert_eq!(keys, vec![1, 3, 5]);
        assert_eq!(c.key_range(), Some((1, 5)));
        assert_eq!(c.point_index(5), Some(2));
        assert!(c.point(4).is_none());
    }

    #[test]
    fn empty_curve_has_no_value() {
        let c = Curve::new("empty", CurveDataType::Float);
        assert_eq!(c.evaluate(0.0, DEFAULT_SAMPLE_STEP), None);
        assert_eq!(c.key_range(), None);
    }

    #[test]
    fn single_point_is_constant() {
        let c = curve(&[(4, 7.5, Interpolation::Bezier)]);
        for f in [-10.0, 4.0, 100.0] {
            assert_eq!(c.evaluate(f, DEFAULT_SAMPLE_STEP), Some(7.5));
        }
    }

    #[test]
    fn out_of_range_clamps() {
        let c = curve(&[(2, 1.0, Interpolation::Bezier), (8, 3.0, Interpolation::Linear)]);
        assert_eq!(c.evaluate(-5.0, DEFAULT_SAMPLE_STEP), Some(1.0));
        assert_eq!(c.evaluate(2.0, DEFAULT_SAMPLE_STEP), Some(1.0));
        assert_eq!(c.evaluate(8.0, DEFAULT_SAMPLE_STEP), Some(3.0));
        assert_eq!(c.evaluate(1e9, DEFAULT_SAMPLE_STEP), Some(3.0));
    }

    #[test]
    fn interior_key_is_exact() {
        let c = curve(&[
            (0, 0.0, Interpolation::Bezier),
            (5, 2.25, Interpolation::Hermite),
            (10, 1.0, Interpolation::Linear),
        ]);
        assert_eq!(c.evaluate(5.0, DEFAULT_SAMPLE_STEP), Some(2.25));
    }

    #[test]
    fn int_curves_round() {
        let mut c = Curve::new("i", CurveDataType::Int);
        c.insert(Point::new(0, 0.0, Interpolation::Linear, 1.0));
        c.insert(Point::new(10, 10.0, Interpolation::Linear, 1.0));
        assert_eq!(c.evaluate(3.4, DEFAULT_SAMPLE_STEP), Some(3.0));
        assert_eq!(c.evaluate(3.6, DEFAULT_SAMPLE_STEP), Some(4.0));
    }
}
