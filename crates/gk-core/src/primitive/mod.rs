//! Primitive mesh generation for seat, prong and gemstone solids
//!
//! Generates triangle meshes for:
//! - Frustum (cylinder or cone between two points, capped)
//! - Sphere (UV sphere)
//! - Revolved profiles (round-cut gemstone)

mod frustum;
mod revolve;
mod sphere;

pub use frustum::{generate_frustum_mesh, generate_frustum_mesh_with_segments};
pub use revolve::generate_revolved_mesh;
pub use sphere::{generate_sphere_mesh, generate_sphere_mesh_with_segments};

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_frustum_mesh() {
        let mesh = generate_frustum_mesh(DVec3::ZERO, 0.5, DVec3::Z, 0.25);
        assert!(!mesh.vertices.is_empty());
        assert_eq!(mesh.vertices.len(), mesh.normals.len());
        assert!(!mesh.triangles.is_empty());
    }

    #[test]
    fn test_sphere_mesh() {
        let mesh = generate_sphere_mesh(DVec3::ZERO, 1.0);
        assert!(!mesh.vertices.is_empty());
        assert_eq!(mesh.vertices.len(), mesh.normals.len());
        assert!(
            mesh.vertices
                .iter()
                .all(|v| (v.length() - 1.0).abs() < 1e-9)
        );
    }

    #[test]
    fn test_frustum_dimensions() {
        let mesh = generate_frustum_mesh(DVec3::new(1.0, 0.0, 0.0), 2.0, DVec3::new(1.0, 0.0, 3.0), 2.0);
        let bb = mesh.bounding_box().unwrap();
        assert!((bb.size().z - 3.0).abs() < 1e-9);
        assert!((bb.size().x - 4.0).abs() < 1e-9);
        assert!((bb.center().x - 1.0).abs() < 1e-9);
    }
}
