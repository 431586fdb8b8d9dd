//! Placement solver
//!
//! Converts curves, point selections and circles into ordered gemstone
//! stations, then seats each station on a face.

mod along_curve;
mod between_curves;
mod points;
mod walk;

pub use along_curve::{CurvePlacementParams, NonlinearProfile, place_along_curve};
pub use between_curves::{AveragePolyline, BetweenCurvesParams, place_between_curves};
pub use points::{place_at_circles, place_at_points};

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize};

use crate::constants::MINIMUM_GEMSTONE_SIZE;
use crate::gemstone::GemstoneCut;
use crate::geometry::{Frame3D, Surface};

/// A solver result before it is seated on a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Arc length along the source curve (may lie outside it when extrapolated)
    pub parameter: f64,
    pub position: DVec3,
    pub size: f64,
}

/// Seating options shared by every gemstone feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeatOptions {
    pub flip_face_normal: bool,
    pub absolute_depth_offset: f64,
    /// Fraction of the gemstone diameter
    pub relative_depth_offset: f64,
}

impl SeatOptions {
    pub fn depth_offset(&self, size: f64) -> f64 {
        self.absolute_depth_offset + self.relative_depth_offset * size
    }
}

/// Final position, orientation and size of one gemstone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: DVec3,
    /// Crown direction of the seated gemstone
    pub normal: DVec3,
    /// Orientation around the normal
    pub tangent: DVec3,
    pub size: f64,
    pub index: usize,
}

impl Placement {
    /// Seat a gemstone of diameter `size` on `surface` near `point`.
    ///
    /// The girdle centre is lifted by half the girdle thickness plus the
    /// depth offset along the face normal; flipping only reverses the
    /// orientation.
    pub fn on_surface(
        surface: &dyn Surface,
        point: DVec3,
        size: f64,
        index: usize,
        cut: GemstoneCut,
        options: &SeatOptions,
    ) -> Self {
        let frame = surface.evaluate(point);
        let normal = frame.z_axis;
        let lift = size * cut.girdle_thickness() / 2.0 + options.depth_offset(size);
        Self {
            position: frame.origin + normal * lift,
            normal: if options.flip_face_normal { -normal } else { normal },
            tangent: frame.x_axis,
            size,
            index,
        }
    }

    pub fn radius(&self) -> f64 {
        self.size / 2.0
    }

    pub fn frame(&self) -> Frame3D {
        Frame3D::from_normal_and_tangent(self.position, self.normal, self.tangent)
    }

    /// Maps the unit-diameter gemstone template onto this placement
    pub fn gemstone_transform(&self) -> DAffine3 {
        self.frame().scaled_affine(self.size)
    }
}

/// Seat every station on `surface`, numbering them in order
pub fn seat_stations(
    surface: &dyn Surface,
    stations: &[Station],
    cut: GemstoneCut,
    options: &SeatOptions,
) -> Vec<Placement> {
    stations
        .iter()
        .enumerate()
        .map(|(index, station)| {
            Placement::on_surface(surface, station.position, station.size, index, cut, options)
        })
        .collect()
}

/// Round `size` to the nearest multiple of `step`; a non-positive step disables rounding
pub fn quantize_size(size: f64, step: f64) -> f64 {
    if step > 0.0 {
        (size / step).round() * step
    } else {
        size
    }
}

/// Raise `size` to the minimum, staying on the `step` grid
pub(crate) fn enforce_minimum(size: f64, step: f64) -> f64 {
    if size >= MINIMUM_GEMSTONE_SIZE {
        return size;
    }
    if step > 0.0 {
        (MINIMUM_GEMSTONE_SIZE / step - 1e-9).ceil() * step
    } else {
        MINIMUM_GEMSTONE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Plane, PlaneSurface};
    use approx::assert_relative_eq;
    use glam::DVec2;

    fn floor() -> PlaneSurface {
        PlaneSurface::new(Plane::XY, DVec2::splat(-10.0), DVec2::splat(10.0))
    }

    #[test]
    fn test_quantize_without_step() {
        assert_relative_eq!(quantize_size(0.0731, 0.0), 0.0731);
        assert_relative_eq!(quantize_size(0.0731, 0.005), 0.075, epsilon = 1e-12);
        assert_relative_eq!(enforce_minimum(0.03, 0.005), 0.05, epsilon = 1e-12);
        assert_relative_eq!(enforce_minimum(0.03, 0.0), 0.05);
    }

    #[test]
    fn test_seat_offsets() {
        let options = SeatOptions {
            flip_face_normal: false,
            absolute_depth_offset: 0.01,
            relative_depth_offset: 0.1,
        };
        let placement = Placement::on_surface(
            &floor(),
            DVec3::new(1.0, 2.0, 0.5),
            0.2,
            0,
            GemstoneCut::Round,
            &options,
        );
        // 0.2 * 0.03 / 2 + 0.01 + 0.02
        assert_relative_eq!(placement.position.z, 0.033, epsilon = 1e-12);
        assert_relative_eq!(placement.position.x, 1.0);
        assert_relative_eq!(placement.normal.z, 1.0);
    }

    #[test]
    fn test_flip_reverses_orientation_only() {
        let options = SeatOptions {
            flip_face_normal: true,
            ..Default::default()
        };
        let placement =
            Placement::on_surface(&floor(), DVec3::ZERO, 0.1, 0, GemstoneCut::Round, &options);
        assert!(placement.position.z > 0.0);
        assert_relative_eq!(placement.normal.z, -1.0);
        let frame = placement.frame();
        assert_relative_eq!(frame.x_axis.cross(frame.y_axis).dot(frame.z_axis), 1.0);
        let table = placement.gemstone_transform().transform_point3(DVec3::new(0.0, 0.0, 0.1));
        assert!(table.z < placement.position.z);
    }
}
