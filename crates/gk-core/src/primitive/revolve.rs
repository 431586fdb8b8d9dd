//! Surfaces of revolution around the Z axis

use std::f64::consts::TAU;

use glam::DVec3;

use crate::geometry::TriangleMesh;

/// Revolve a `(radius, z)` profile around Z.
///
/// Profile points with zero radius collapse to a single pole vertex, so a
/// profile starting and ending on the axis yields a closed solid.
pub fn generate_revolved_mesh(profile: &[(f64, f64)], segments: u32) -> TriangleMesh {
    let segments = segments.max(3) as usize;
    let mut vertices = Vec::new();
    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(profile.len());

    for &(radius, z) in profile {
        if radius.abs() < 1e-12 {
            vertices.push(DVec3::new(0.0, 0.0, z));
            rings.push(vec![vertices.len() - 1; segments + 1]);
            continue;
        }
        let start = vertices.len();
        for i in 0..=segments {
            let theta = (i as f64 / segments as f64) * TAU;
            vertices.push(DVec3::new(radius * theta.cos(), radius * theta.sin(), z));
        }
        rings.push((start..=start + segments).collect());
    }

    let mut triangles = Vec::new();
    for pair in rings.windows(2) {
        let (lower, upper) = (&pair[0], &pair[1]);
        for i in 0..segments {
            let (a, b) = (lower[i], lower[i + 1]);
            let (c, d) = (upper[i], upper[i + 1]);
            // Skip triangles collapsed at a pole
            if a != b {
                triangles.push([a, b, c]);
            }
            if c != d {
                triangles.push([b, d, c]);
            }
        }
    }

    TriangleMesh::new(vertices, triangles)
}
