//! Orthonormal frames and planes

use glam::{DAffine3, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::error::{JewelryError, JewelryResult};

/// Right-handed orthonormal frame with an origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame3D {
    pub origin: DVec3,
    pub x_axis: DVec3,
    pub y_axis: DVec3,
    pub z_axis: DVec3,
}

impl Default for Frame3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Frame3D {
    pub const IDENTITY: Self = Self {
        origin: DVec3::ZERO,
        x_axis: DVec3::X,
        y_axis: DVec3::Y,
        z_axis: DVec3::Z,
    };

    /// Frame with `z = normal` and `x` as close to `tangent` as possible.
    ///
    /// A tangent parallel to the normal falls back to an arbitrary
    /// perpendicular direction.
    pub fn from_normal_and_tangent(origin: DVec3, normal: DVec3, tangent: DVec3) -> Self {
        let z_axis = normal.try_normalize().unwrap_or(DVec3::Z);
        let x_axis = (tangent - z_axis * tangent.dot(z_axis))
            .try_normalize()
            .unwrap_or_else(|| z_axis.any_orthonormal_pair().0);
        let y_axis = z_axis.cross(x_axis);
        Self {
            origin,
            x_axis,
            y_axis,
            z_axis,
        }
    }

    /// Same frame with the normal reversed (`z` and `y` negated)
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            x_axis: self.x_axis,
            y_axis: -self.y_axis,
            z_axis: -self.z_axis,
        }
    }

    /// Local-to-world transform
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_cols(self.x_axis, self.y_axis, self.z_axis, self.origin)
    }

    /// Local-to-world transform with a uniform scale
    pub fn scaled_affine(&self, scale: f64) -> DAffine3 {
        DAffine3::from_cols(
            self.x_axis * scale,
            self.y_axis * scale,
            self.z_axis * scale,
            self.origin,
        )
    }

    /// Transform mapping `from` onto `to`
    pub fn align(from: &Frame3D, to: &Frame3D) -> DAffine3 {
        to.to_affine() * from.to_affine().inverse()
    }
}

/// Construction plane spanned by two orthonormal axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: DVec3,
    pub x_axis: DVec3,
    pub y_axis: DVec3,
}

impl Default for Plane {
    fn default() -> Self {
        Self::XY
    }
}

impl Plane {
    pub const XY: Self = Self {
        origin: DVec3::ZERO,
        x_axis: DVec3::X,
        y_axis: DVec3::Y,
    };

    /// Orthonormalize `y_dir` against `x_dir`
    pub fn new(origin: DVec3, x_dir: DVec3, y_dir: DVec3) -> JewelryResult<Self> {
        let x_axis = x_dir
            .try_normalize()
            .ok_or_else(|| JewelryError::DegenerateGeometry("plane x axis is zero".into()))?;
        let y_axis = (y_dir - x_axis * y_dir.dot(x_axis))
            .try_normalize()
            .ok_or_else(|| {
                JewelryError::DegenerateGeometry("plane axes are parallel".into())
            })?;
        Ok(Self {
            origin,
            x_axis,
            y_axis,
        })
    }

    pub fn normal(&self) -> DVec3 {
        self.x_axis.cross(self.y_axis)
    }

    pub fn to_local(&self, point: DVec3) -> DVec2 {
        let d = point - self.origin;
        DVec2::new(d.dot(self.x_axis), d.dot(self.y_axis))
    }

    pub fn from_local(&self, uv: DVec2) -> DVec3 {
        self.origin + self.x_axis * uv.x + self.y_axis * uv.y
    }

    /// Orthogonal projection onto the plane
    pub fn project(&self, point: DVec3) -> DVec3 {
        self.from_local(self.to_local(point))
    }

    pub fn frame_at(&self, point: DVec3) -> Frame3D {
        Frame3D {
            origin: point,
            x_axis: self.x_axis,
            y_axis: self.y_axis,
            z_axis: self.normal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_is_orthonormal() {
        let frame = Frame3D::from_normal_and_tangent(
            DVec3::ONE,
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(1.0, 0.0, 1.0),
        );
        assert_relative_eq!(frame.x_axis.x, 1.0);
        assert_relative_eq!(frame.y_axis.y, 1.0);
        assert_relative_eq!(frame.x_axis.cross(frame.y_axis).dot(frame.z_axis), 1.0);
    }

    #[test]
    fn test_parallel_tangent_falls_back() {
        let frame = Frame3D::from_normal_and_tangent(DVec3::ZERO, DVec3::Z, DVec3::Z);
        assert_relative_eq!(frame.x_axis.dot(DVec3::Z), 0.0);
        assert_relative_eq!(frame.x_axis.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_align_maps_origin_and_axes() {
        let from = Frame3D::IDENTITY;
        let to = Frame3D::from_normal_and_tangent(DVec3::new(1.0, 2.0, 3.0), DVec3::X, DVec3::Y);
        let transform = Frame3D::align(&from, &to);
        let moved = transform.transform_point3(DVec3::Z);
        assert_relative_eq!(moved.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(moved.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_local_coordinates() {
        let plane = Plane::new(DVec3::new(0.0, 0.0, 1.0), DVec3::X, DVec3::new(1.0, 1.0, 0.0)).unwrap();
        let uv = plane.to_local(DVec3::new(2.0, 3.0, 5.0));
        assert_relative_eq!(uv.x, 2.0);
        assert_relative_eq!(uv.y, 3.0);
        assert_relative_eq!(plane.project(DVec3::new(2.0, 3.0, 5.0)).z, 1.0);
    }
}
