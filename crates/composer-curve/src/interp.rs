#![forbid(unsafe_code)]

//! Segment interpolation math.
//!
//! Spline segments are evaluated by fixed-step parametric sampling rather
//! than by inverting the frame polynomial: the curve is walked at
//! `u = 0, step, 2·step, ..., 1`, the sample interval whose frame coordinate
//! brackets the requested frame is located, and the value coordinate is
//! interpolated linearly inside it. This stays well defined for segments
//! whose frame coordinate is not monotonic in `u`.
//!
//! The step is a tunable ([`CurveConfig::sample_step`](crate::CurveConfig)),
//! not a precision guarantee: long spans resolve to fewer samples per frame.

use crate::point::{Interpolation, Point, Side, Tangent};

/// Default parametric sampling step.
pub const DEFAULT_SAMPLE_STEP: f64 = 0.001;

/// Upper bound on samples per segment, whatever the configured step.
const MAX_SAMPLES: usize = 1 << 20;

type Vec2 = (f64, f64);

#[inline]
#[must_use]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Cubic Bezier through control points `p0..p3` at parameter `u`.
#[must_use]
pub fn cubic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, u: f64) -> Vec2 {
    let v = 1.0 - u;
    let b0 = v * v * v;
    let b1 = 3.0 * v * v * u;
    let b2 = 3.0 * v * u * u;
    let b3 = u * u * u;
    (
        b0 * p0.0 + b1 * p1.0 + b2 * p2.0 + b3 * p3.0,
        b0 * p0.1 + b1 * p1.1 + b2 * p2.1 + b3 * p3.1,
    )
}

/// Cubic Hermite from `p0` (tangent `m0`) to `p1` (tangent `m1`) at `u`.
#[must_use]
pub fn cubic_hermite(p0: Vec2, m0: Vec2, p1: Vec2, m1: Vec2, u: f64) -> Vec2 {
    let u2 = u * u;
    let u3 = u2 * u;
    let h00 = 2.0 * u3 - 3.0 * u2 + 1.0;
    let h10 = u3 - 2.0 * u2 + u;
    let h01 = -2.0 * u3 + 3.0 * u2;
    let h11 = u3 - u2;
    (
        h00 * p0.0 + h10 * m0.0 + h01 * p1.0 + h11 * m1.0,
        h00 * p0.1 + h10 * m0.1 + h01 * p1.1 + h11 * m1.1,
    )
}

/// Value of the segment `start -> end` at `at_frame`, shaped by `kind`.
///
/// `at_frame` is expected inside `[start.key_frame, end.key_frame]`.
#[must_use]
pub fn sample_segment(
    start: &Point,
    end: &Point,
    kind: Interpolation,
    at_frame: f64,
    step: f64,
) -> f64 {
    let (f0, v0) = start.anchor();
    let (f1, v1) = end.anchor();
    let span = f1 - f0;

    match kind {
        Interpolation::Step => v0,
        Interpolation::Linear => {
            if span == 0.0 {
                v0
            } else {
                lerp(v0, v1, (at_frame - f0) / span)
            }
        }
        Interpolation::Bezier => {
            let p1 = (f0 + start.right.frame, v0 + start.right.value);
            let p2 = (f1 + end.left.frame, v1 + end.left.value);
            sample_by_frame(at_frame, step, |u| {
                cubic_bezier((f0, v0), p1, p2, (f1, v1), u)
            })
        }
        Interpolation::Hermite => {
            let m0 = (span * start.right.frame, span * start.right.value);
            let m1 = (-span * end.left.frame, -span * end.left.value);
            sample_by_frame(at_frame, step, |u| {
                cubic_hermite((f0, v0), m0, (f1, v1), m1, u)
            })
        }
    }
}

/// Number of sample intervals for a parametric step.
fn sample_count(step: f64) -> usize {
    let step = if step.is_finite() && step > 0.0 {
        step
    } else {
        DEFAULT_SAMPLE_STEP
    };
    // Saturating float-to-int cast; bounded below by 1.
    ((1.0 / step).round() as usize).clamp(1, MAX_SAMPLES)
}

fn sample_by_frame(at_frame: f64, step: f64, curve: impl Fn(f64) -> Vec2) -> f64 {
    let n = sample_count(step);
    let mut prev = curve(0.0);
    let mut nearest = prev;
    for k in 1..=n {
        let cur = curve(k as f64 / n as f64);
        let (lo, hi) = if prev.0 <= cur.0 {
            (prev, cur)
        } else {
            (cur, prev)
        };
        if lo.0 <= at_frame && at_frame <= hi.0 {
            let extent = hi.0 - lo.0;
            if extent == 0.0 {
                return lo.1;
            }
            return lerp(lo.1, hi.1, (at_frame - lo.0) / extent);
        }
        if (cur.0 - at_frame).abs() < (nearest.0 - at_frame).abs() {
            nearest = cur;
        }
        prev = cur;
    }
    nearest.1
}

/// Re-encode a handle when its segment switches between spline kinds.
///
/// A Bezier handle `h` and the Hermite handle `h·3/span` describe the same
/// segment, so the conversion is a pure rescale and switching back and forth
/// is lossless. The canonical Bezier `(±span/3, ±slope·span/3)` maps to the
/// unit Hermite `(±1, ±slope)`. Other kind pairs, and segments without a
/// positive frame length, return `tangent` as is.
#[must_use]
pub fn convert_handle(
    from: Interpolation,
    to: Interpolation,
    tangent: Tangent,
    span: f64,
    side: Side,
) -> Tangent {
    if !(span.is_finite() && span > 0.0) {
        return tangent;
    }
    let scale = match (from, to) {
        (Interpolation::Bezier, Interpolation::Hermite) => 3.0 / span,
        (Interpolation::Hermite, Interpolation::Bezier) => span / 3.0,
        _ => return tangent,
    };
    Tangent::new(tangent.frame * scale, tangent.value * scale).clamped_to(side)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn point(key: i32, value: f64, kind: Interpolation) -> Point {
        Point::new(key, value, kind, 1.0)
    }

    #[test]
    fn bezier_and_hermite_hit_endpoints() {
        let p = cubic_bezier((0.0, 1.0), (1.0, 5.0), (2.0, -3.0), (3.0, 2.0), 0.0);
        assert_eq!(p, (0.0, 1.0));
        let p = cubic_bezier((0.0, 1.0), (1.0, 5.0), (2.0, -3.0), (3.0, 2.0), 1.0);
        assert_eq!(p, (3.0, 2.0));
        let h = cubic_hermite((0.0, 1.0), (3.0, 9.0), (3.0, 2.0), (3.0, -1.0), 1.0);
        assert_eq!(h, (3.0, 2.0));
    }

    #[test]
    fn hermite_matches_bezier_with_thirds() {
        let p0 = (0.0, 0.0);
        let p3 = (6.0, 4.0);
        let m0 = (6.0, 3.0);
        let m1 = (6.0, -6.0);
        let p1 = (p0.0 + m0.0 / 3.0, p0.1 + m0.1 / 3.0);
        let p2 = (p3.0 - m1.0 / 3.0, p3.1 - m1.1 / 3.0);
        for i in 0..=10 {
            let u = f64::from(i) / 10.0;
            let b = cubic_bezier(p0, p1, p2, p3, u);
            let h = cubic_hermite(p0, m0, p3, m1, u);
            assert!((b.0 - h.0).abs() < EPS && (b.1 - h.1).abs() < EPS, "u={u}");
        }
    }

    #[test]
    fn linear_is_exact() {
        let a = point(0, 0.0, Interpolation::Linear);
        let b = point(10, 10.0, Interpolation::Linear);
        assert_eq!(
            sample_segment(&a, &b, Interpolation::Linear, 5.0, DEFAULT_SAMPLE_STEP),
            5.0
        );
    }

    #[test]
    fn step_holds_left_value() {
        let a = point(0, 1.0, Interpolation::Step);
        let b = point(10, 2.0, Interpolation::Step);
        assert_eq!(
            sample_segment(&a, &b, Interpolation::Step, 9.0, DEFAULT_SAMPLE_STEP),
            1.0
        );
    }

    #[test]
    fn flat_bezier_is_monotone_between_keys() {
        let mut a = point(0, 0.0, Interpolation::Bezier);
        let mut b = point(9, 9.0, Interpolation::Bezier);
        a.right = Tangent::flat(3.0);
        b.left = Tangent::flat(-3.0);
        let mut last = 0.0;
        for f in 1..9 {
            let v = sample_segment(&a, &b, Interpolation::Bezier, f64::from(f), DEFAULT_SAMPLE_STEP);
            assert!(v > last && v < 9.0, "frame {f}: {v}");
            last = v;
        }
        let mid = sample_segment(&a, &b, Interpolation::Bezier, 4.5, DEFAULT_SAMPLE_STEP);
        assert!((mid - 4.5).abs() < 1e-6);
    }

    #[test]
    fn coarse_step_still_brackets() {
        let a = point(0, 0.0, Interpolation::Hermite);
        let b = point(4, 8.0, Interpolation::Hermite);
        let v = sample_segment(&a, &b, Interpolation::Hermite, 2.0, 0.5);
        assert!((v - 4.0).abs() < EPS);
        assert_eq!(sample_count(0.0), 1000);
        assert_eq!(sample_count(f64::NAN), 1000);
        assert_eq!(sample_count(10.0), 1);
    }

    #[test]
    fn convert_rescales_and_keeps_direction() {
        let bezier = Tangent::new(2.0, 4.0);
        let hermite = convert_handle(
            Interpolation::Bezier,
            Interpolation::Hermite,
            bezier,
            6.0,
            Side::Right,
        );
        assert_eq!(hermite, Tangent::new(1.0, 2.0));

        let back = convert_handle(
            Interpolation::Hermite,
            Interpolation::Bezier,
            hermite,
            6.0,
            Side::Right,
        );
        assert_eq!(back, bezier);

        let left = convert_handle(
            Interpolation::Hermite,
            Interpolation::Bezier,
            Tangent::new(-1.0, 0.5),
            9.0,
            Side::Left,
        );
        assert_eq!(left, Tangent::new(-3.0, 1.5));
    }

    #[test]
    fn convert_keeps_handle_length_through_a_round_trip() {
        // One-frame Bezier handles on a ten-frame segment.
        let right = Tangent::new(1.0, 0.25);
        let hermite = convert_handle(
            Interpolation::Bezier,
            Interpolation::Hermite,
            right,
            10.0,
            Side::Right,
        );
        assert!((hermite.frame - 0.3).abs() < EPS);
        assert!((hermite.value - 0.075).abs() < EPS);
        let back = convert_handle(
            Interpolation::Hermite,
            Interpolation::Bezier,
            hermite,
            10.0,
            Side::Right,
        );
        assert!((back.frame - right.frame).abs() < EPS);
        assert!((back.value - right.value).abs() < EPS);
    }

    #[test]
    fn hermite_segment_matches_the_bezier_it_came_from() {
        let mut a = point(0, 0.0, Interpolation::Bezier);
        let mut b = point(10, 10.0, Interpolation::Bezier);
        a.right = Tangent::new(1.0, 2.0);
        b.left = Tangent::new(-2.5, 0.5);
        let mut ha = a;
        let mut hb = b;
        ha.right = convert_handle(Interpolation::Bezier, Interpolation::Hermite, a.right, 10.0, Side::Right);
        hb.left = convert_handle(Interpolation::Bezier, Interpolation::Hermite, b.left, 10.0, Side::Left);
        for f in 1..10 {
            let at = f64::from(f);
            let bz = sample_segment(&a, &b, Interpolation::Bezier, at, DEFAULT_SAMPLE_STEP);
            let hm = sample_segment(&ha, &hb, Interpolation::Hermite, at, DEFAULT_SAMPLE_STEP);
            assert!((bz - hm).abs() < 1e-6, "frame {f}: {bz} vs {hm}");
        }
    }

    #[test]
    fn convert_without_span_is_identity() {
        let t = Tangent::new(0.0, 3.0);
        assert_eq!(
            convert_handle(Interpolation::Bezier, Interpolation::Hermite, t, 0.0, Side::Left),
            t
        );
        let scaled = convert_handle(Interpolation::Bezier, Interpolation::Hermite, t, 6.0, Side::Left);
        assert_eq!(scaled, Tangent::new(0.0, 1.5));
    }

    #[test]
    fn convert_between_other_kinds_is_identity() {
        let t = Tangent::new(0.7, 0.1);
        assert_eq!(
            convert_handle(Interpolation::Linear, Interpolation::Bezier, t, 6.0, Side::Right),
            t
        );
    }
}
