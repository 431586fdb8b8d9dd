//! In-memory solid modeler
//!
//! Stores body descriptions and answers face queries analytically. Stands in
//! for the host modeler in tests and in the headless runner.

use std::collections::HashMap;
use std::f64::consts::PI;

use glam::{DAffine3, DVec3};
use gk_core::{GemstoneCut, Primitive, Shape, TriangleMesh};
use parking_lot::RwLock;
use uuid::Uuid;

use super::traits::{BodyGeometry, CadError, CadKernel, CadResult, FaceGeometry, FaceId, FaceInfo, Solid};

#[derive(Debug, Default)]
struct Bodies {
    order: Vec<Uuid>,
    geometry: HashMap<Uuid, BodyGeometry>,
}

/// Kernel keeping every body in a shared map
#[derive(Debug, Default)]
pub struct MemoryKernel {
    bodies: RwLock<Bodies>,
}

impl MemoryKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bodies.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CadKernel for MemoryKernel {
    fn create_body(&self, geometry: &BodyGeometry) -> CadResult<Solid> {
        validate(geometry)?;
        let solid = Solid::new(Uuid::new_v4());
        let mut bodies = self.bodies.write();
        bodies.order.push(solid.id);
        bodies.geometry.insert(solid.id, geometry.clone());
        tracing::debug!("Created {} body {}", geometry.type_name(), solid.id);
        Ok(solid)
    }

    fn update_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()> {
        validate(geometry)?;
        let mut bodies = self.bodies.write();
        let slot = bodies
            .geometry
            .get_mut(&solid.id)
            .ok_or(CadError::SolidNotFound(solid.id))?;
        *slot = geometry.clone();
        Ok(())
    }

    fn remove_body(&self, solid: &Solid) -> CadResult<()> {
        let mut bodies = self.bodies.write();
        bodies
            .geometry
            .remove(&solid.id)
            .ok_or(CadError::SolidNotFound(solid.id))?;
        bodies.order.retain(|id| *id != solid.id);
        Ok(())
    }

    fn restore_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()> {
        let mut bodies = self.bodies.write();
        if bodies.geometry.contains_key(&solid.id) {
            return Err(CadError::OperationFailed(format!("body {} already exists", solid.id)));
        }
        bodies.order.push(solid.id);
        bodies.geometry.insert(solid.id, geometry.clone());
        Ok(())
    }

    fn contains(&self, solid: &Solid) -> bool {
        self.bodies.read().geometry.contains_key(&solid.id)
    }

    fn geometry(&self, solid: &Solid) -> CadResult<BodyGeometry> {
        self.bodies
            .read()
            .geometry
            .get(&solid.id)
            .cloned()
            .ok_or(CadError::SolidNotFound(solid.id))
    }

    fn solids(&self) -> Vec<Solid> {
        self.bodies.read().order.iter().copied().map(Solid::new).collect()
    }

    fn faces(&self, solid: &Solid) -> CadResult<Vec<FaceInfo>> {
        let geometry = self.geometry(solid)?;
        let faces = match &geometry {
            BodyGeometry::Gemstone { cut, placement } => gemstone_faces(*cut, placement),
            BodyGeometry::Shape(shape) => shape_faces(shape),
            BodyGeometry::Mesh(mesh) => mesh_faces(mesh),
        };
        Ok(faces
            .into_iter()
            .enumerate()
            .map(|(index, (geometry, centroid, area))| FaceInfo {
                id: FaceId::new(solid.id, index as u32),
                geometry,
                centroid,
                area,
            })
            .collect())
    }
}

fn validate(geometry: &BodyGeometry) -> CadResult<()> {
    let finite = match geometry {
        BodyGeometry::Gemstone { placement, .. } => {
            placement.is_finite() && placement.matrix3.determinant().abs() > 1e-18
        }
        BodyGeometry::Shape(shape) => shape.placement.is_finite(),
        BodyGeometry::Mesh(mesh) => mesh.vertices.iter().all(|v| v.is_finite()),
    };
    if finite {
        Ok(())
    } else {
        Err(CadError::InvalidGeometry(format!(
            "{} body has non-finite or singular placement",
            geometry.type_name()
        )))
    }
}

type RawFace = (FaceGeometry, DVec3, f64);

// ============== Face analysis ==============

/// One face per segment of the revolved profile
fn gemstone_faces(cut: GemstoneCut, placement: &DAffine3) -> Vec<RawFace> {
    let scale = placement.matrix3.x_axis.length();
    let axis = (placement.matrix3 * DVec3::Z).normalize_or(DVec3::Z);
    let on_axis = |z: f64| placement.transform_point3(DVec3::new(0.0, 0.0, z));
    let profile = cut.profile();

    profile
        .windows(2)
        .filter_map(|pair| {
            let ((r0, z0), (r1, z1)) = (pair[0], pair[1]);
            if (z0 - z1).abs() < 1e-12 {
                if (r0 - r1).abs() < 1e-12 {
                    return None;
                }
                let normal = if z0 > 0.0 { axis } else { -axis };
                let area = PI * (r1 * r1 - r0 * r0).abs() * scale * scale;
                Some((FaceGeometry::Plane { origin: on_axis(z0), normal }, on_axis(z0), area))
            } else if (r0 - r1).abs() < 1e-12 {
                let (low, high) = (z0.min(z1), z0.max(z1));
                let height = (high - low) * scale;
                let radius = r0 * scale;
                let cylinder = FaceGeometry::Cylinder {
                    origin: on_axis(low),
                    axis,
                    radius,
                    height,
                };
                Some((cylinder, on_axis((low + high) / 2.0), 2.0 * PI * radius * height))
            } else {
                let t = r0 / (r0 - r1);
                let apex_z = z0 + t * (z1 - z0);
                let base_z = if r0 > r1 { z0 } else { z1 };
                let slant = ((r1 - r0).powi(2) + (z1 - z0).powi(2)).sqrt();
                let cone = FaceGeometry::Cone {
                    apex: on_axis(apex_z),
                    axis: if base_z > apex_z { axis } else { -axis },
                    half_angle: ((r1 - r0).abs() / (z1 - z0).abs()).atan(),
                };
                let centroid_z = z0 + (z1 - z0) * (r0 + 2.0 * r1) / (3.0 * (r0 + r1));
                let area = PI * (r0 + r1) * slant * scale * scale;
                Some((cone, on_axis(centroid_z), area))
            }
        })
        .collect()
}

/// Lateral face plus caps of every material-contributing primitive
fn shape_faces(shape: &Shape) -> Vec<RawFace> {
    let mut faces = Vec::new();
    for primitive in shape.world_csg().solid_primitives() {
        match *primitive {
            Primitive::Frustum {
                base,
                base_radius,
                top,
                top_radius,
            } => {
                let span = top - base;
                let height = span.length();
                let Some(axis) = span.try_normalize() else {
                    continue;
                };
                let slant = ((base_radius - top_radius).powi(2) + height * height).sqrt();
                let lateral_area = PI * (base_radius + top_radius) * slant;
                let centroid = base
                    + span * (base_radius + 2.0 * top_radius)
                        / (3.0 * (base_radius + top_radius)).max(1e-12);
                let lateral = if (base_radius - top_radius).abs() < 1e-12 {
                    FaceGeometry::Cylinder {
                        origin: base,
                        axis,
                        radius: base_radius,
                        height,
                    }
                } else {
                    let t = base_radius / (base_radius - top_radius);
                    let apex = base + span * t;
                    FaceGeometry::Cone {
                        apex,
                        axis: if t > 0.0 { -axis } else { axis },
                        half_angle: ((base_radius - top_radius).abs() / height).atan(),
                    }
                };
                faces.push((lateral, centroid, lateral_area));
                for (center, radius, normal) in [(base, base_radius, -axis), (top, top_radius, axis)] {
                    if radius > 1e-12 {
                        faces.push((
                            FaceGeometry::Plane { origin: center, normal },
                            center,
                            PI * radius * radius,
                        ));
                    }
                }
            }
            Primitive::Sphere { center, radius } => {
                faces.push((
                    FaceGeometry::Sphere { center, radius },
                    center,
                    4.0 * PI * radius * radius,
                ));
            }
        }
    }
    faces
}

fn mesh_faces(mesh: &TriangleMesh) -> Vec<RawFace> {
    if mesh.triangles.is_empty() {
        return Vec::new();
    }
    let area = (0..mesh.triangles.len()).map(|t| mesh.triangle_area(t)).sum();
    vec![(FaceGeometry::Freeform, mesh.centroid(), area)]
}
