//! Frustum mesh generation (with end caps)

use glam::{DAffine3, DVec3};

use super::generate_revolved_mesh;
use crate::geometry::{Frame3D, TriangleMesh};

/// Generate a capped frustum from `base` to `top`
///
/// # Arguments
/// * `base_radius` - Radius at `base`
/// * `top_radius` - Radius at `top`; equal radii give a cylinder, zero gives a cone
pub fn generate_frustum_mesh(base: DVec3, base_radius: f64, top: DVec3, top_radius: f64) -> TriangleMesh {
    use crate::constants::FRUSTUM_SEGMENTS;
    generate_frustum_mesh_with_segments(base, base_radius, top, top_radius, FRUSTUM_SEGMENTS)
}

/// Generate a frustum mesh with custom segment count
pub fn generate_frustum_mesh_with_segments(
    base: DVec3,
    base_radius: f64,
    top: DVec3,
    top_radius: f64,
    segments: u32,
) -> TriangleMesh {
    let axis = top - base;
    let height = axis.length();
    let profile = [
        (0.0, 0.0),
        (base_radius.abs(), 0.0),
        (top_radius.abs(), height),
        (0.0, height),
    ];
    let mesh = generate_revolved_mesh(&profile, segments);

    let frame = Frame3D::from_normal_and_tangent(base, axis, DVec3::X);
    let placement: DAffine3 = frame.to_affine();
    mesh.transformed(&placement)
}
