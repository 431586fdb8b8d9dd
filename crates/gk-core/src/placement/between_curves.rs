//! Gemstones between two roughly parallel curves

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::walk::Walk;
use super::{Station, quantize_size};
use crate::constants::{BETWEEN_CURVES_SAMPLE_STEP, MINIMUM_GEMSTONE_SIZE};
use crate::error::{JewelryError, JewelryResult, check_range};
use crate::geometry::Curve3D;

/// Inputs of [`place_between_curves`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetweenCurvesParams {
    pub start_offset: f64,
    pub end_offset: f64,
    pub size_step: f64,
    pub target_gap: f64,
    /// Gemstone diameter relative to the local distance between the curves
    pub size_ratio: f64,
    pub flip_direction: bool,
    pub uniform: bool,
}

impl Default for BetweenCurvesParams {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            end_offset: 0.0,
            size_step: 0.005,
            target_gap: 0.01,
            size_ratio: 1.0,
            flip_direction: false,
            uniform: false,
        }
    }
}

impl BetweenCurvesParams {
    pub fn validate(&self) -> JewelryResult<()> {
        check_range("startOffset", self.start_offset, f64::MIN, f64::MAX)?;
        check_range("endOffset", self.end_offset, f64::MIN, f64::MAX)?;
        check_range("sizeStep", self.size_step, 0.0, 0.1)?;
        check_range("targetGap", self.target_gap, 0.0, f64::MAX)?;
        check_range("sizeRatio", self.size_ratio, 0.5, 2.0)?;
        Ok(())
    }
}

/// Midline between two curves, sampled by position along the average length
#[derive(Debug, Clone, PartialEq)]
pub struct AveragePolyline {
    samples: Vec<(f64, DVec3)>,
}

impl AveragePolyline {
    /// Pair up both curves by normalized arc length (reversing the second one
    /// when its ends are closer to the opposite ends of the first) and refine
    /// interior midpoints towards the true midline.
    pub fn new(curve_a: &dyn Curve3D, curve_b: &dyn Curve3D, flip_direction: bool) -> Self {
        let length_a = curve_a.length();
        let length_b = curve_b.length();

        let parallel = curve_a.start_point().distance(curve_b.start_point())
            + curve_a.end_point().distance(curve_b.end_point());
        let anti_parallel = curve_a.start_point().distance(curve_b.end_point())
            + curve_a.end_point().distance(curve_b.start_point());
        let opposed = anti_parallel < parallel;

        let average_length = (length_a + length_b) / 2.0;
        let count = ((length_a.max(length_b) / BETWEEN_CURVES_SAMPLE_STEP) as usize + 1).max(2);

        let samples = (0..count)
            .map(|i| {
                let ratio = i as f64 / (count - 1) as f64;
                let ratio_a = if flip_direction { 1.0 - ratio } else { ratio };
                let ratio_b = if opposed { 1.0 - ratio_a } else { ratio_a };

                let a = curve_a.point_at_parameter(ratio_a * length_a);
                let b = curve_b.point_at_parameter(ratio_b * length_b);
                let mut midpoint = (a + b) / 2.0;

                if i != 0 && i != count - 1 {
                    midpoint = (curve_a.nearest_point(midpoint) + curve_b.nearest_point(midpoint)) / 2.0;
                }
                (ratio * average_length, midpoint)
            })
            .collect();

        Self { samples }
    }

    pub fn length(&self) -> f64 {
        self.samples.last().map(|s| s.0).unwrap_or(0.0)
    }

    /// Point at `position`, extended along the first or last segment outside the range
    pub fn point_at(&self, position: f64) -> DVec3 {
        let n = self.samples.len();
        let segment = |i: usize| {
            let (p0, a) = self.samples[i];
            let (p1, b) = self.samples[i + 1];
            (p0, a, p1, b)
        };
        let index = if position <= self.samples[0].0 {
            0
        } else if position >= self.samples[n - 1].0 {
            n - 2
        } else {
            self.samples
                .partition_point(|s| s.0 <= position)
                .saturating_sub(1)
                .min(n - 2)
        };
        let (p0, a, p1, b) = segment(index);
        let span = p1 - p0;
        if span < 1e-10 {
            return a;
        }
        a + (b - a) * ((position - p0) / span)
    }
}

/// Stations along the midline of `curve_a` and `curve_b`, sized by the local
/// distance between them
pub fn place_between_curves(
    curve_a: &dyn Curve3D,
    curve_b: &dyn Curve3D,
    params: &BetweenCurvesParams,
) -> JewelryResult<Vec<Station>> {
    params.validate()?;

    let polyline = AveragePolyline::new(curve_a, curve_b, params.flip_direction);
    let length = polyline.length();
    if length <= 0.0 {
        return Err(JewelryError::DegenerateGeometry("curves have zero length".into()));
    }

    let start = params.start_offset;
    let end = length - params.end_offset;
    if end < start {
        return Err(JewelryError::InvalidParameter(format!(
            "offsets {} and {} leave no room between the curves",
            params.start_offset, params.end_offset
        )));
    }

    let walk = Walk {
        point: |position: f64| polyline.point_at(position),
        size: |position: f64| {
            let point = polyline.point_at(position.clamp(0.0, length));
            let distance = (curve_a.distance_to(point) + curve_b.distance_to(point)) / 2.0;
            let size = 2.0 * distance * params.size_ratio;
            quantize_size(size, params.size_step).max(MINIMUM_GEMSTONE_SIZE)
        },
        start,
        end,
        gap: params.target_gap,
        bounds: Some((0.0, length)),
    };

    let stations = walk.run(params.uniform);
    tracing::debug!("Placed {} gemstones between curves", stations.len());
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIZE_EPSILON;
    use crate::geometry::Polyline3D;
    use approx::assert_relative_eq;

    fn rails(width: f64, reversed: bool) -> (Polyline3D, Polyline3D) {
        let a = Polyline3D::line(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0)).unwrap();
        let (s, e) = (DVec3::new(0.0, width, 0.0), DVec3::new(1.0, width, 0.0));
        let b = if reversed {
            Polyline3D::line(e, s).unwrap()
        } else {
            Polyline3D::line(s, e).unwrap()
        };
        (a, b)
    }

    #[test]
    fn test_midline_of_opposed_curves() {
        let (a, b) = rails(0.2, true);
        let polyline = AveragePolyline::new(&a, &b, false);
        let mid = polyline.point_at(0.5);
        assert_relative_eq!(mid.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(mid.y, 0.1, epsilon = 1e-9);
        assert_relative_eq!(polyline.point_at(-0.1).x, -0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_sizes_follow_width() {
        let (a, b) = rails(0.1, false);
        let stations = place_between_curves(&a, &b, &BetweenCurvesParams::default()).unwrap();
        assert!(stations.len() > 3);
        for station in &stations {
            assert_relative_eq!(station.size, 0.1, epsilon = 1e-9);
            assert_relative_eq!(station.position.y, 0.05, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ratio_out_of_range() {
        let (a, b) = rails(0.1, false);
        let params = BetweenCurvesParams {
            size_ratio: 3.0,
            ..Default::default()
        };
        assert!(matches!(
            place_between_curves(&a, &b, &params),
            Err(JewelryError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_negative_offsets_extend_past_curve_ends() {
        let (a, b) = rails(0.1, true);
        let params = BetweenCurvesParams {
            start_offset: -0.2,
            end_offset: -0.2,
            ..Default::default()
        };
        let stations = place_between_curves(&a, &b, &params).unwrap();

        let first = &stations[0];
        assert_relative_eq!(first.position.x, -0.2, epsilon = 1e-9);
        assert_relative_eq!(first.position.y, 0.05, epsilon = 1e-9);
        assert_relative_eq!(first.size, 0.1, epsilon = 1e-9);

        let last = &stations[stations.len() - 1];
        assert!(last.position.x > 1.0);
        assert!(last.position.x + last.size / 2.0 <= 1.2 + SIZE_EPSILON);
        assert_relative_eq!(last.position.y, 0.05, epsilon = 1e-9);
        assert_relative_eq!(last.size, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_flip_direction_starts_at_other_end() {
        let (a, b) = rails(0.1, false);
        let params = BetweenCurvesParams {
            flip_direction: true,
            ..Default::default()
        };
        let stations = place_between_curves(&a, &b, &params).unwrap();
        assert_relative_eq!(stations[0].position.x, 1.0, epsilon = 1e-9);
    }
}
