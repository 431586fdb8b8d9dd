//! CAD Kernel trait definitions
//!
//! These traits define the interface to the host's solid modeler. Bodies are
//! owned by the kernel; the add-in only holds their identifiers.

use glam::{DAffine3, DVec3};
use gk_core::{BoundingBox, GemstoneCut, Shape, TriangleMesh};
use gk_core::constants::FRUSTUM_SEGMENTS;
use gk_core::primitive::generate_revolved_mesh;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a face within a solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceId {
    /// ID of the solid this face belongs to
    pub solid_id: Uuid,
    /// Index of the face within the solid
    pub index: u32,
}

impl FaceId {
    /// Create a new face ID
    pub fn new(solid_id: Uuid, index: u32) -> Self {
        Self { solid_id, index }
    }
}

/// Analytic type of a face, as reported by the modeler's geometry queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaceGeometry {
    Plane {
        origin: DVec3,
        normal: DVec3,
    },
    /// `origin` is the centre of the bottom circle, `axis` points towards the top
    Cylinder {
        origin: DVec3,
        axis: DVec3,
        radius: f64,
        height: f64,
    },
    Cone {
        apex: DVec3,
        axis: DVec3,
        half_angle: f64,
    },
    Sphere {
        center: DVec3,
        radius: f64,
    },
    /// Triangulated or spline face without an analytic description
    Freeform,
}

impl FaceGeometry {
    pub fn is_plane(&self) -> bool {
        matches!(self, FaceGeometry::Plane { .. })
    }

    pub fn is_cylinder(&self) -> bool {
        matches!(self, FaceGeometry::Cylinder { .. })
    }
}

/// Information about a face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceInfo {
    /// Unique identifier for this face
    pub id: FaceId,
    pub geometry: FaceGeometry,
    /// Area-weighted center point of the face
    pub centroid: DVec3,
    /// Approximate area of the face
    pub area: f64,
}

/// Error type for CAD kernel operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Solid not found: {0}")]
    SolidNotFound(Uuid),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

/// Result type for CAD operations
pub type CadResult<T> = Result<T, CadError>;

/// Description the modeler turns into a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyGeometry {
    /// Revolved gemstone template mapped by a placement transform
    Gemstone { cut: GemstoneCut, placement: DAffine3 },
    /// Constructive solid (prongs, channels, cutters)
    Shape(Shape),
    /// Triangulated body, e.g. imported or deformed by a refold
    Mesh(TriangleMesh),
}

impl BodyGeometry {
    /// Apply a transform on top of the current placement
    pub fn transformed(&self, transform: &DAffine3) -> Self {
        match self {
            BodyGeometry::Gemstone { cut, placement } => BodyGeometry::Gemstone {
                cut: *cut,
                placement: *transform * *placement,
            },
            BodyGeometry::Shape(shape) => {
                BodyGeometry::Shape(shape.clone().with_placement(*transform * shape.placement))
            }
            BodyGeometry::Mesh(mesh) => BodyGeometry::Mesh(mesh.clone().transformed(transform)),
        }
    }

    pub fn tessellate(&self) -> TriangleMesh {
        match self {
            BodyGeometry::Gemstone { cut, placement } => {
                generate_revolved_mesh(&cut.profile(), FRUSTUM_SEGMENTS).transformed(placement)
            }
            BodyGeometry::Shape(shape) => shape.tessellate(),
            BodyGeometry::Mesh(mesh) => mesh.clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BodyGeometry::Gemstone { .. } => "Gemstone",
            BodyGeometry::Shape(_) => "Shape",
            BodyGeometry::Mesh(_) => "Mesh",
        }
    }
}

/// A 3D solid body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Solid {
    /// Unique identifier
    pub id: Uuid,
}

impl Solid {
    /// Create a new solid with the given ID
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }
}

/// The main CAD kernel trait
///
/// Implementations wrap the host's solid modeler; [`super::MemoryKernel`]
/// keeps bodies in memory for tests and the headless runner.
pub trait CadKernel: Send + Sync {
    /// Create a new body
    fn create_body(&self, geometry: &BodyGeometry) -> CadResult<Solid>;

    /// Replace the geometry of an existing body, keeping its identity
    fn update_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()>;

    /// Delete a body
    fn remove_body(&self, solid: &Solid) -> CadResult<()>;

    /// Bring back a removed body under its previous identity (undo of a delete)
    fn restore_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()>;

    /// Check whether the body still exists
    fn contains(&self, solid: &Solid) -> bool;

    /// Current description of a body
    fn geometry(&self, solid: &Solid) -> CadResult<BodyGeometry>;

    /// All live bodies, in creation order
    fn solids(&self) -> Vec<Solid>;

    // ========== Face Query Methods ==========

    /// Get all faces of a solid with their geometric information
    fn faces(&self, solid: &Solid) -> CadResult<Vec<FaceInfo>>;

    /// Tessellate a solid into triangles
    fn tessellate(&self, solid: &Solid) -> CadResult<TriangleMesh> {
        Ok(self.geometry(solid)?.tessellate())
    }

    fn bounding_box(&self, solid: &Solid) -> CadResult<BoundingBox> {
        self.tessellate(solid)?
            .bounding_box()
            .ok_or_else(|| CadError::InvalidGeometry(format!("body {} is empty", solid.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_core::Primitive;

    #[test]
    fn test_transformed_composes_placement() {
        let shape = Shape::new(Primitive::sphere(DVec3::ZERO, 1.0))
            .with_placement(DAffine3::from_translation(DVec3::X));
        let moved = BodyGeometry::Shape(shape).transformed(&DAffine3::from_translation(DVec3::Y));
        let bb = moved.tessellate().bounding_box().unwrap();
        assert!((bb.center() - DVec3::new(1.0, 1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_gemstone_tessellation_is_scaled() {
        let geometry = BodyGeometry::Gemstone {
            cut: GemstoneCut::Round,
            placement: DAffine3::from_scale(DVec3::splat(0.2)),
        };
        let bb = geometry.tessellate().bounding_box().unwrap();
        assert!((bb.size().x - 0.2).abs() < 1e-9);
    }
}
