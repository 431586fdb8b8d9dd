//! Carry flat-pattern geometry back onto the unfolded surface

use glam::{DAffine3, DVec3};

use crate::error::JewelryResult;
use crate::geometry::{Frame3D, Surface, TriangleMesh};

use super::UnfoldMapping;

/// Map a point near the construction plane onto the surface.
///
/// The height above the plane is kept as an offset along the surface normal.
pub fn refold_point(mapping: &UnfoldMapping, point: DVec3) -> JewelryResult<DVec3> {
    let plane = &mapping.plane;
    let height = (point - plane.origin).dot(plane.normal());
    let sample = mapping.locate(plane.to_local(point))?;
    Ok(sample.position + sample.normal * height)
}

/// Deform every vertex of a flat mesh onto the surface
pub fn refold_mesh(mapping: &UnfoldMapping, mesh: &TriangleMesh) -> JewelryResult<TriangleMesh> {
    let vertices = mesh
        .vertices
        .iter()
        .map(|&vertex| refold_point(mapping, vertex))
        .collect::<JewelryResult<Vec<_>>>()?;
    Ok(TriangleMesh::new(vertices, mesh.triangles.clone()))
}

/// Rigid transform moving a body from the flat pattern onto the surface.
///
/// `footprint_center` is projected onto the construction plane and located in
/// the mapping. When the source face is still available the located point is
/// snapped onto it. The target frame keeps the global x direction of the
/// unfold anchors, projected into the tangent plane.
pub fn refold_transform(
    mapping: &UnfoldMapping,
    footprint_center: DVec3,
    surface: Option<&dyn Surface>,
) -> JewelryResult<DAffine3> {
    let plane = &mapping.plane;
    let sample = mapping.locate(plane.to_local(footprint_center))?;
    let (target, normal) = match surface {
        Some(surface) => surface.nearest_point(sample.position),
        None => (sample.position, sample.normal),
    };

    let anchors = &mapping.anchors;
    let global_x = anchors.x_direction - anchors.origin;
    let global_y = anchors.y_direction - anchors.origin;
    let mut x_axis = (global_x - normal * global_x.dot(normal))
        .try_normalize()
        .unwrap_or_else(|| normal.any_orthonormal_pair().0);
    let mut y_axis = normal.cross(x_axis).normalize();
    if global_y.dot(y_axis) < 0.0 {
        y_axis = -y_axis;
        x_axis = y_axis.cross(normal).normalize();
    }

    let from = plane.frame_at(plane.project(footprint_center));
    let to = Frame3D {
        origin: target,
        x_axis,
        y_axis,
        z_axis: normal,
    };
    Ok(Frame3D::align(&from, &to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Plane;
    use crate::unfold::{UnfoldAlgorithm, UnfoldAnchors};
    use approx::assert_relative_eq;
    use glam::DVec2;

    /// Unit square folded up into the XZ plane, normals along -Y
    fn wall() -> UnfoldMapping {
        UnfoldMapping {
            anchors: UnfoldAnchors {
                origin: DVec3::ZERO,
                x_direction: DVec3::X,
                y_direction: DVec3::Z,
            },
            plane: Plane::XY,
            accuracy: 0.5,
            algorithm: UnfoldAlgorithm::Mesh,
            flat_points: vec![DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y],
            source_points: vec![
                DVec3::ZERO,
                DVec3::X,
                DVec3::new(1.0, 0.0, 1.0),
                DVec3::Z,
            ],
            source_normals: vec![DVec3::NEG_Y; 4],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    #[test]
    fn test_height_follows_normal() {
        let p = refold_point(&wall(), DVec3::new(0.5, 0.5, 0.2)).unwrap();
        assert_relative_eq!(p.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(p.y, -0.2, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rigid_transform_stands_body_up() {
        let transform = refold_transform(&wall(), DVec3::new(0.5, 0.5, 0.0), None).unwrap();
        let center = transform.transform_point3(DVec3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(center.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(center.z, 0.5, epsilon = 1e-12);

        // plane normal becomes the surface normal, flat +X stays +X
        let up = transform.transform_vector3(DVec3::Z);
        assert_relative_eq!(up.y, -1.0, epsilon = 1e-12);
        let x = transform.transform_vector3(DVec3::X);
        assert_relative_eq!(x.x, 1.0, epsilon = 1e-12);
        let y = transform.transform_vector3(DVec3::Y);
        assert_relative_eq!(y.z, 1.0, epsilon = 1e-12);
    }
}
