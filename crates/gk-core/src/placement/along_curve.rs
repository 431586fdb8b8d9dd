//! Gemstones along a single curve

use serde::{Deserialize, Serialize};

use super::walk::Walk;
use super::{Station, enforce_minimum, quantize_size};
use crate::constants::{
    MINIMUM_GEMSTONE_SIZE, MINIMUM_INTERPOLATED_SIZE, NONLINEAR_POSITION_RANGE, SIZE_EPSILON,
};
use crate::error::{JewelryError, JewelryResult, check_range};
use crate::geometry::Curve3D;

/// Quadratic size profile passing through `size` at normalized `position`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonlinearProfile {
    pub size: f64,
    pub position: f64,
}

/// Inputs of [`place_along_curve`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePlacementParams {
    pub start_offset: f64,
    pub end_offset: f64,
    pub start_size: f64,
    pub end_size: f64,
    /// Size grid; zero disables quantization
    pub size_step: f64,
    pub target_gap: f64,
    pub uniform: bool,
    pub flip_direction: bool,
    pub nonlinear: Option<NonlinearProfile>,
}

impl Default for CurvePlacementParams {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            end_offset: 0.0,
            start_size: 0.1,
            end_size: 0.07,
            size_step: 0.005,
            target_gap: 0.01,
            uniform: false,
            flip_direction: false,
            nonlinear: None,
        }
    }
}

impl CurvePlacementParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offsets(mut self, start: f64, end: f64) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    pub fn with_sizes(mut self, start: f64, end: f64) -> Self {
        self.start_size = start;
        self.end_size = end;
        self
    }

    pub fn with_size_step(mut self, step: f64) -> Self {
        self.size_step = step;
        self
    }

    pub fn with_target_gap(mut self, gap: f64) -> Self {
        self.target_gap = gap;
        self
    }

    pub fn with_uniform(mut self, uniform: bool) -> Self {
        self.uniform = uniform;
        self
    }

    pub fn with_flip_direction(mut self, flip: bool) -> Self {
        self.flip_direction = flip;
        self
    }

    pub fn with_nonlinear(mut self, profile: Option<NonlinearProfile>) -> Self {
        self.nonlinear = profile;
        self
    }

    fn is_constant_size(&self) -> bool {
        (self.start_size - self.end_size).abs() < SIZE_EPSILON && self.nonlinear.is_none()
    }

    pub fn validate(&self) -> JewelryResult<()> {
        for (name, value) in [
            ("startOffset", self.start_offset),
            ("endOffset", self.end_offset),
            ("startSize", self.start_size),
            ("endSize", self.end_size),
        ] {
            if !value.is_finite() {
                return Err(JewelryError::InvalidParameter(format!("{} is not finite", name)));
            }
        }
        check_range("sizeStep", self.size_step, 0.0, 0.1)?;
        check_range("targetGap", self.target_gap, 0.0, f64::MAX)?;
        if let Some(profile) = &self.nonlinear {
            check_range("nonlinearPosition", profile.position, 0.0, 1.0)?;
            check_range("nonlinearSize", profile.size, 0.0, f64::MAX)?;
        }
        if self.is_constant_size() && self.start_size < MINIMUM_GEMSTONE_SIZE {
            return Err(JewelryError::SizeBelowMinimum {
                size: self.start_size,
                minimum: MINIMUM_GEMSTONE_SIZE,
            });
        }
        if self.start_size <= 0.0 || self.end_size <= 0.0 {
            return Err(JewelryError::InvalidParameter("sizes must be positive".into()));
        }
        Ok(())
    }

    /// Size at normalized position `t ∈ [0, 1]` before quantization
    pub fn interpolate(&self, t: f64) -> f64 {
        if self.is_constant_size() {
            return self.start_size;
        }
        let t = t.clamp(0.0, 1.0);
        let delta = self.end_size - self.start_size;
        let size = match &self.nonlinear {
            None => self.start_size + delta * t,
            Some(profile) => {
                let p = profile
                    .position
                    .clamp(*NONLINEAR_POSITION_RANGE.start(), *NONLINEAR_POSITION_RANGE.end());
                let denominator = p * (p - 1.0);
                if denominator.abs() < SIZE_EPSILON {
                    self.start_size + delta * t
                } else {
                    let a = ((profile.size - self.start_size) - delta * p) / denominator;
                    let b = delta - a;
                    a * t * t + b * t + self.start_size
                }
            }
        };
        size.max(MINIMUM_INTERPOLATED_SIZE)
    }
}

/// Stations along `curve` in traversal order.
///
/// Offsets are measured from the traversal start and end; negative offsets
/// extend the curve along its end tangents.
pub fn place_along_curve(
    curve: &dyn Curve3D,
    params: &CurvePlacementParams,
) -> JewelryResult<Vec<Station>> {
    params.validate()?;

    let length = curve.length();
    if length <= SIZE_EPSILON {
        return Err(JewelryError::DegenerateGeometry("curve has zero length".into()));
    }

    let start = params.start_offset;
    let end = length - params.end_offset;
    let available = end - start;
    if available <= 0.0 {
        return Err(JewelryError::InvalidParameter(format!(
            "offsets {} and {} leave no room on a curve of length {:.4}",
            params.start_offset, params.end_offset, length
        )));
    }

    let to_curve = |position: f64| {
        if params.flip_direction {
            length - position
        } else {
            position
        }
    };

    let walk = Walk {
        point: |position: f64| curve.point_at_extended(to_curve(position)),
        size: |position: f64| {
            if params.is_constant_size() {
                return params.start_size;
            }
            let size = params.interpolate((position - start) / available);
            enforce_minimum(quantize_size(size, params.size_step), params.size_step)
        },
        start,
        end,
        gap: params.target_gap,
        bounds: Some((0.0, length)),
    };

    let stations: Vec<Station> = walk
        .run(params.uniform)
        .into_iter()
        .map(|station| Station {
            parameter: to_curve(station.parameter),
            ..station
        })
        .collect();

    tracing::debug!(
        "Placed {} gemstones along a curve of length {:.4}",
        stations.len(),
        length
    );
    Ok(stations)
}
