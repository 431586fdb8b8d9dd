//! Sphere mesh generation (UV sphere)

use std::f64::consts::PI;

use glam::DVec3;

use crate::geometry::TriangleMesh;

/// Generate a UV sphere mesh
pub fn generate_sphere_mesh(center: DVec3, radius: f64) -> TriangleMesh {
    use crate::constants::{SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS};
    generate_sphere_mesh_with_segments(center, radius, SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS)
}

/// Generate a sphere mesh with custom segment counts
pub fn generate_sphere_mesh_with_segments(
    center: DVec3,
    radius: f64,
    lat_segments: u32,
    lon_segments: u32,
) -> TriangleMesh {
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut triangles = Vec::new();

    for lat in 0..=lat_segments {
        let theta = (lat as f64 / lat_segments as f64) * PI;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for lon in 0..=lon_segments {
            let phi = (lon as f64 / lon_segments as f64) * 2.0 * PI;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let normal = DVec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta);
            vertices.push(center + normal * radius);
            normals.push(normal);
        }
    }

    let row = lon_segments as usize + 1;
    for lat in 0..lat_segments as usize {
        for lon in 0..lon_segments as usize {
            let current = lat * row + lon;
            let next = current + row;

            triangles.push([current, next, current + 1]);
            triangles.push([current + 1, next, next + 1]);
        }
    }

    TriangleMesh {
        vertices,
        normals,
        triangles,
    }
}
