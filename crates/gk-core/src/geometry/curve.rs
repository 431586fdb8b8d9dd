//! Arc-length parameterized curves

use std::f64::consts::TAU;
use std::fmt::Debug;

use glam::DVec3;

use crate::error::{JewelryError, JewelryResult};

/// An immutable 3D curve parameterized by arc length `s ∈ [0, length]`.
///
/// Sketch curves and model edges are both converted into an implementation of
/// this trait, so the placement solver never branches on entity kinds.
pub trait Curve3D: Send + Sync + Debug {
    /// Total arc length
    fn length(&self) -> f64;

    /// Point at arc length `s`, clamped to the curve
    fn point_at_parameter(&self, s: f64) -> DVec3;

    /// Unit tangent at arc length `s`, clamped to the curve
    fn tangent_at_parameter(&self, s: f64) -> DVec3;

    /// Arc length of the curve point closest to `point`
    fn evaluate_nearest_parameter(&self, point: DVec3) -> f64;

    fn start_point(&self) -> DVec3 {
        self.point_at_parameter(0.0)
    }

    fn end_point(&self) -> DVec3 {
        self.point_at_parameter(self.length())
    }

    fn is_closed(&self) -> bool {
        self.start_point().distance(self.end_point()) < 1e-9
    }

    fn nearest_point(&self, point: DVec3) -> DVec3 {
        self.point_at_parameter(self.evaluate_nearest_parameter(point))
    }

    fn distance_to(&self, point: DVec3) -> f64 {
        self.nearest_point(point).distance(point)
    }

    /// Point at `s`, extended linearly along the end tangents outside `[0, length]`
    fn point_at_extended(&self, s: f64) -> DVec3 {
        let length = self.length();
        if s < 0.0 {
            self.start_point() + self.tangent_at_parameter(0.0) * s
        } else if s > length {
            self.end_point() + self.tangent_at_parameter(length) * (s - length)
        } else {
            self.point_at_parameter(s)
        }
    }

    /// `count` points evenly spaced by arc length, endpoints included
    fn sample(&self, count: usize) -> Vec<DVec3> {
        let count = count.max(2);
        let length = self.length();
        (0..count)
            .map(|i| self.point_at_parameter(length * i as f64 / (count - 1) as f64))
            .collect()
    }
}

// ============== Polyline ==============

/// Piecewise-linear curve, used for lines, splines and model edges
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline3D {
    points: Vec<DVec3>,
    cumulative: Vec<f64>,
}

impl Polyline3D {
    /// Build from ordered points; coincident neighbours are dropped
    pub fn new(points: Vec<DVec3>) -> JewelryResult<Self> {
        if points.len() < 2 {
            return Err(JewelryError::InsufficientSelection(format!(
                "a curve needs at least 2 points, got {}",
                points.len()
            )));
        }
        let mut deduped: Vec<DVec3> = Vec::with_capacity(points.len());
        for point in points {
            if !point.is_finite() {
                return Err(JewelryError::DegenerateGeometry(
                    "polyline point is not finite".into(),
                ));
            }
            if deduped.last().is_none_or(|last| last.distance(point) > 1e-12) {
                deduped.push(point);
            }
        }
        if deduped.len() < 2 {
            return Err(JewelryError::DegenerateGeometry(
                "curve has zero length".into(),
            ));
        }

        let mut cumulative = Vec::with_capacity(deduped.len());
        let mut total = 0.0;
        cumulative.push(0.0);
        for pair in deduped.windows(2) {
            total += pair[0].distance(pair[1]);
            cumulative.push(total);
        }

        Ok(Self {
            points: deduped,
            cumulative,
        })
    }

    /// Straight segment from `start` to `end`
    pub fn line(start: DVec3, end: DVec3) -> JewelryResult<Self> {
        Self::new(vec![start, end])
    }

    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// Segment index and local fraction for arc length `s`
    fn locate(&self, s: f64) -> (usize, f64) {
        let s = s.clamp(0.0, self.length());
        let last_segment = self.points.len() - 2;
        let index = self
            .cumulative
            .partition_point(|&c| c <= s)
            .saturating_sub(1)
            .min(last_segment);
        let segment_length = self.cumulative[index + 1] - self.cumulative[index];
        let t = if segment_length > 0.0 {
            (s - self.cumulative[index]) / segment_length
        } else {
            0.0
        };
        (index, t.clamp(0.0, 1.0))
    }
}

impl Curve3D for Polyline3D {
    fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    fn point_at_parameter(&self, s: f64) -> DVec3 {
        let (index, t) = self.locate(s);
        self.points[index].lerp(self.points[index + 1], t)
    }

    fn tangent_at_parameter(&self, s: f64) -> DVec3 {
        let (index, _) = self.locate(s);
        (self.points[index + 1] - self.points[index]).normalize()
    }

    fn evaluate_nearest_parameter(&self, point: DVec3) -> f64 {
        let mut best = (f64::INFINITY, 0.0);
        for (index, pair) in self.points.windows(2).enumerate() {
            let segment = pair[1] - pair[0];
            let t = ((point - pair[0]).dot(segment) / segment.length_squared()).clamp(0.0, 1.0);
            let distance = (pair[0] + segment * t).distance_squared(point);
            if distance < best.0 {
                let s = self.cumulative[index] + t * segment.length();
                best = (distance, s);
            }
        }
        best.1
    }
}

// ============== Circular arc ==============

/// Arc of a circle, sweeping `sweep` radians counter-clockwise around `normal`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularArc {
    center: DVec3,
    normal: DVec3,
    radius: f64,
    start_dir: DVec3,
    sweep: f64,
}

impl CircularArc {
    pub fn new(
        center: DVec3,
        normal: DVec3,
        radius: f64,
        start_dir: DVec3,
        sweep: f64,
    ) -> JewelryResult<Self> {
        let normal = normal
            .try_normalize()
            .ok_or_else(|| JewelryError::DegenerateGeometry("arc normal is zero".into()))?;
        let start_dir = (start_dir - normal * start_dir.dot(normal))
            .try_normalize()
            .ok_or_else(|| {
                JewelryError::DegenerateGeometry("arc start direction is parallel to normal".into())
            })?;
        if !(radius > 0.0) || sweep.abs() < 1e-12 {
            return Err(JewelryError::DegenerateGeometry(
                "arc has zero length".into(),
            ));
        }
        Ok(Self {
            center,
            normal,
            radius,
            start_dir,
            sweep: sweep.clamp(-TAU, TAU),
        })
    }

    /// Arc through three points, from `start` via `mid` to `end`
    pub fn from_three_points(start: DVec3, mid: DVec3, end: DVec3) -> JewelryResult<Self> {
        let ab = mid - start;
        let ac = end - start;
        let n = ab.cross(ac);
        let n_len2 = n.length_squared();
        if n_len2 < 1e-20 {
            return Err(JewelryError::DegenerateGeometry(
                "arc points are colinear".into(),
            ));
        }
        let center = start
            + (n.cross(ab) * ac.length_squared() + ac.cross(n) * ab.length_squared())
                / (2.0 * n_len2);
        let radius = center.distance(start);
        let normal = n / n_len2.sqrt();
        let start_dir = (start - center) / radius;

        // start, mid, end run counter-clockwise around `normal` by construction
        let binormal = normal.cross(start_dir);
        let v = end - center;
        let mut sweep = v.dot(binormal).atan2(v.dot(start_dir));
        if sweep <= 0.0 {
            sweep += TAU;
        }
        Self::new(center, normal, radius, start_dir, sweep)
    }

    /// Full circle starting at an arbitrary in-plane direction
    pub fn full_circle(circle: &Circle) -> JewelryResult<Self> {
        let normal = circle.normal.try_normalize().unwrap_or(DVec3::Z);
        let (start_dir, _) = normal.any_orthonormal_pair();
        Self::new(circle.center, normal, circle.radius, start_dir, TAU)
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn direction_at(&self, angle: f64) -> DVec3 {
        let binormal = self.normal.cross(self.start_dir);
        self.start_dir * angle.cos() + binormal * angle.sin()
    }

    fn angle_at(&self, s: f64) -> f64 {
        s.clamp(0.0, self.length()) / self.radius * self.sweep.signum()
    }
}

impl Curve3D for CircularArc {
    fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }

    fn point_at_parameter(&self, s: f64) -> DVec3 {
        self.center + self.direction_at(self.angle_at(s)) * self.radius
    }

    fn tangent_at_parameter(&self, s: f64) -> DVec3 {
        let angle = self.angle_at(s);
        let binormal = self.normal.cross(self.start_dir);
        (binormal * angle.cos() - self.start_dir * angle.sin()) * self.sweep.signum()
    }

    fn evaluate_nearest_parameter(&self, point: DVec3) -> f64 {
        let binormal = self.normal.cross(self.start_dir);
        let v = point - self.center;
        let mut angle = v.dot(binormal).atan2(v.dot(self.start_dir)) * self.sweep.signum();
        if angle < 0.0 {
            angle += TAU;
        }
        let sweep = self.sweep.abs();
        if angle <= sweep {
            return angle * self.radius;
        }
        // Outside the arc: pick the closer endpoint
        let to_start = point.distance(self.start_point());
        let to_end = point.distance(self.end_point());
        if to_start <= to_end { 0.0 } else { self.length() }
    }
}

/// Circle used by circle-based placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: DVec3,
    pub normal: DVec3,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: DVec3, normal: DVec3, radius: f64) -> Self {
        Self {
            center,
            normal,
            radius,
        }
    }

    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_polyline_length_and_points() {
        let line = Polyline3D::new(vec![
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        ])
        .unwrap();
        assert_relative_eq!(line.length(), 2.0);
        assert_relative_eq!(line.point_at_parameter(1.5).y, 0.5);
        assert_relative_eq!(line.tangent_at_parameter(1.5).y, 1.0);
        assert_relative_eq!(line.evaluate_nearest_parameter(DVec3::new(2.0, 0.25, 0.0)), 1.25);
    }

    #[test]
    fn test_polyline_zero_length_is_degenerate() {
        let result = Polyline3D::new(vec![DVec3::ONE, DVec3::ONE]);
        assert!(matches!(result, Err(JewelryError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_extended_points_follow_end_tangents() {
        let line = Polyline3D::line(DVec3::ZERO, DVec3::X).unwrap();
        assert_relative_eq!(line.point_at_extended(-0.2).x, -0.2);
        assert_relative_eq!(line.point_at_extended(1.5).x, 1.5);
    }

    #[test]
    fn test_arc_from_three_points() {
        let arc = CircularArc::from_three_points(
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
        )
        .unwrap();
        assert_relative_eq!(arc.radius(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(arc.length(), PI, epsilon = 1e-12);
        let mid = arc.point_at_parameter(PI / 2.0);
        assert_relative_eq!(mid.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(
            arc.evaluate_nearest_parameter(DVec3::new(0.0, 3.0, 0.0)),
            PI / 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_full_circle_is_closed() {
        let circle = Circle::new(DVec3::ZERO, DVec3::Z, 0.5);
        let arc = CircularArc::full_circle(&circle).unwrap();
        assert!(arc.is_closed());
        assert_relative_eq!(arc.length(), PI, epsilon = 1e-12);
    }
}
