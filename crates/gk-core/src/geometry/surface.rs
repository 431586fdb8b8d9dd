//! Parametric faces

use std::f64::consts::TAU;
use std::fmt::Debug;

use glam::{DVec2, DVec3};

use super::{Frame3D, Plane, TriangleMesh};

/// A face of the host model, evaluated through its `(u, v)` parameter space
pub trait Surface: Send + Sync + Debug {
    /// `(min, max)` corners of the parameter rectangle
    fn parameter_range(&self) -> (DVec2, DVec2);

    fn point_at_parameter(&self, uv: DVec2) -> DVec3;

    /// Outward unit normal
    fn normal_at_parameter(&self, uv: DVec2) -> DVec3;

    /// Partial derivatives along `u` and `v`
    fn first_derivative(&self, uv: DVec2) -> (DVec3, DVec3);

    /// Parameters of the face point closest to `point`, clamped to the face
    fn parameter_at_point(&self, point: DVec3) -> DVec2;

    fn is_parameter_on_face(&self, uv: DVec2) -> bool {
        let (min, max) = self.parameter_range();
        let eps = 1e-9;
        uv.x >= min.x - eps && uv.x <= max.x + eps && uv.y >= min.y - eps && uv.y <= max.y + eps
    }

    /// Closest face point and the normal there
    fn nearest_point(&self, point: DVec3) -> (DVec3, DVec3) {
        let uv = self.parameter_at_point(point);
        (self.point_at_parameter(uv), self.normal_at_parameter(uv))
    }

    /// Frame at the face point nearest to `point`: x along `∂/∂u`, z along the normal
    fn evaluate(&self, point: DVec3) -> Frame3D {
        let uv = self.parameter_at_point(point);
        let (du, _) = self.first_derivative(uv);
        Frame3D::from_normal_and_tangent(
            self.point_at_parameter(uv),
            self.normal_at_parameter(uv),
            du,
        )
    }

    /// Regular grid tessellation whose edges are no longer than `step`
    fn tessellate(&self, step: f64) -> TriangleMesh {
        let (min, max) = self.parameter_range();
        let step = step.max(1e-6);
        let count = |from: f64, to: f64| (((to - from) / step).ceil() as usize).clamp(1, 400);
        tessellate_grid(self, count(min.x, max.x), count(min.y, max.y))
    }
}

/// Sample `nu × nv` grid cells; triangles are `[i00, i10, i01]` and `[i10, i11, i01]`
pub fn tessellate_grid<S: Surface + ?Sized>(surface: &S, nu: usize, nv: usize) -> TriangleMesh {
    let (min, max) = surface.parameter_range();
    let nu = nu.max(1);
    let nv = nv.max(1);
    let mut vertices = Vec::with_capacity((nu + 1) * (nv + 1));
    let mut normals = Vec::with_capacity((nu + 1) * (nv + 1));

    for j in 0..=nv {
        let v = min.y + (max.y - min.y) * j as f64 / nv as f64;
        for i in 0..=nu {
            let u = min.x + (max.x - min.x) * i as f64 / nu as f64;
            let uv = DVec2::new(u, v);
            vertices.push(surface.point_at_parameter(uv));
            normals.push(surface.normal_at_parameter(uv));
        }
    }

    let row = nu + 1;
    let mut triangles = Vec::with_capacity(nu * nv * 2);
    for j in 0..nv {
        for i in 0..nu {
            let i00 = j * row + i;
            let i10 = i00 + 1;
            let i01 = i00 + row;
            let i11 = i01 + 1;
            triangles.push([i00, i10, i01]);
            triangles.push([i10, i11, i01]);
        }
    }

    TriangleMesh {
        vertices,
        normals,
        triangles,
    }
}

// ============== Plane ==============

/// Rectangular planar face; parameters are plane-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub plane: Plane,
    pub min: DVec2,
    pub max: DVec2,
}

impl PlaneSurface {
    pub fn new(plane: Plane, min: DVec2, max: DVec2) -> Self {
        Self {
            plane,
            min: min.min(max),
            max: min.max(max),
        }
    }
}

impl Surface for PlaneSurface {
    fn parameter_range(&self) -> (DVec2, DVec2) {
        (self.min, self.max)
    }

    fn point_at_parameter(&self, uv: DVec2) -> DVec3 {
        self.plane.from_local(uv)
    }

    fn normal_at_parameter(&self, _uv: DVec2) -> DVec3 {
        self.plane.normal()
    }

    fn first_derivative(&self, _uv: DVec2) -> (DVec3, DVec3) {
        (self.plane.x_axis, self.plane.y_axis)
    }

    fn parameter_at_point(&self, point: DVec3) -> DVec2 {
        self.plane.to_local(point).clamp(self.min, self.max)
    }
}

// ============== Cylinder ==============

/// Cylindrical face. `u` is arc length around the axis, `v` the height along
/// it, so the parameterization is isometric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderSurface {
    base: DVec3,
    axis: DVec3,
    ref_dir: DVec3,
    radius: f64,
    angles: (f64, f64),
    heights: (f64, f64),
}

impl CylinderSurface {
    /// `angles` are radians from `ref_dir` around `axis`
    pub fn new(
        base: DVec3,
        axis: DVec3,
        ref_dir: DVec3,
        radius: f64,
        angles: (f64, f64),
        heights: (f64, f64),
    ) -> Self {
        let axis = axis.try_normalize().unwrap_or(DVec3::Z);
        let ref_dir = (ref_dir - axis * ref_dir.dot(axis))
            .try_normalize()
            .unwrap_or_else(|| axis.any_orthonormal_pair().0);
        Self {
            base,
            axis,
            ref_dir,
            radius: radius.abs(),
            angles: (angles.0.min(angles.1), angles.0.max(angles.1)),
            heights: (heights.0.min(heights.1), heights.0.max(heights.1)),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn axis(&self) -> DVec3 {
        self.axis
    }

    fn radial(&self, angle: f64) -> DVec3 {
        let binormal = self.axis.cross(self.ref_dir);
        self.ref_dir * angle.cos() + binormal * angle.sin()
    }
}

impl Surface for CylinderSurface {
    fn parameter_range(&self) -> (DVec2, DVec2) {
        (
            DVec2::new(self.angles.0 * self.radius, self.heights.0),
            DVec2::new(self.angles.1 * self.radius, self.heights.1),
        )
    }

    fn point_at_parameter(&self, uv: DVec2) -> DVec3 {
        self.base + self.axis * uv.y + self.radial(uv.x / self.radius) * self.radius
    }

    fn normal_at_parameter(&self, uv: DVec2) -> DVec3 {
        self.radial(uv.x / self.radius)
    }

    fn first_derivative(&self, uv: DVec2) -> (DVec3, DVec3) {
        let angle = uv.x / self.radius;
        let binormal = self.axis.cross(self.ref_dir);
        (
            binormal * angle.cos() - self.ref_dir * angle.sin(),
            self.axis,
        )
    }

    fn parameter_at_point(&self, point: DVec3) -> DVec2 {
        let local = point - self.base;
        let height = local.dot(self.axis).clamp(self.heights.0, self.heights.1);
        let binormal = self.axis.cross(self.ref_dir);
        let mut angle = local.dot(binormal).atan2(local.dot(self.ref_dir));
        while angle < self.angles.0 {
            angle += TAU;
        }
        while angle > self.angles.0 + TAU {
            angle -= TAU;
        }
        if angle > self.angles.1 {
            // Past the end of the sweep: snap to whichever boundary is closer
            let past_end = angle - self.angles.1;
            let before_start = self.angles.0 + TAU - angle;
            angle = if past_end <= before_start {
                self.angles.1
            } else {
                self.angles.0
            };
        }
        DVec2::new(angle * self.radius, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn half_cylinder() -> CylinderSurface {
        CylinderSurface::new(DVec3::ZERO, DVec3::Y, DVec3::X, 1.0, (0.0, PI), (0.0, 2.0))
    }

    #[test]
    fn test_cylinder_evaluation() {
        let cylinder = half_cylinder();
        let uv = DVec2::new(PI / 2.0, 1.0);
        let point = cylinder.point_at_parameter(uv);
        assert_relative_eq!(point.z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(point.y, 1.0, epsilon = 1e-12);
        let back = cylinder.parameter_at_point(point * 1.5);
        assert_relative_eq!(back.x, uv.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_frame() {
        let face = PlaneSurface::new(Plane::XY, DVec2::splat(-1.0), DVec2::splat(1.0));
        let frame = face.evaluate(DVec3::new(0.5, 0.5, 3.0));
        assert_relative_eq!(frame.origin.z, 0.0);
        assert_relative_eq!(frame.z_axis.z, 1.0);
        assert_relative_eq!(frame.x_axis.x, 1.0);
    }

    #[test]
    fn test_grid_tessellation_counts() {
        let mesh = tessellate_grid(&half_cylinder(), 4, 3);
        assert_eq!(mesh.vertices.len(), 20);
        assert_eq!(mesh.triangles.len(), 24);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
    }
}
