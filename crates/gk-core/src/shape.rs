//! Kernel-independent solid descriptions
//!
//! Prongs, channels and cutters are computed as constructive solid trees in a
//! local frame; the host kernel turns them into bodies.

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, TriangleMesh};
use crate::primitive::{generate_frustum_mesh, generate_sphere_mesh};

/// Leaf solid of a CSG tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// Capped cone or cylinder between two axis points
    Frustum {
        base: DVec3,
        base_radius: f64,
        top: DVec3,
        top_radius: f64,
    },
    Sphere { center: DVec3, radius: f64 },
}

impl Primitive {
    pub fn cylinder(base: DVec3, top: DVec3, radius: f64) -> Self {
        Primitive::Frustum {
            base,
            base_radius: radius,
            top,
            top_radius: radius,
        }
    }

    pub fn cone(base: DVec3, base_radius: f64, apex: DVec3) -> Self {
        Primitive::Frustum {
            base,
            base_radius,
            top: apex,
            top_radius: 0.0,
        }
    }

    pub fn sphere(center: DVec3, radius: f64) -> Self {
        Primitive::Sphere { center, radius }
    }

    /// Apply a rigid transform
    pub fn transformed(&self, transform: &DAffine3) -> Self {
        let scale = transform.matrix3.x_axis.length();
        match self {
            Primitive::Frustum {
                base,
                base_radius,
                top,
                top_radius,
            } => Primitive::Frustum {
                base: transform.transform_point3(*base),
                base_radius: base_radius * scale,
                top: transform.transform_point3(*top),
                top_radius: top_radius * scale,
            },
            Primitive::Sphere { center, radius } => Primitive::Sphere {
                center: transform.transform_point3(*center),
                radius: radius * scale,
            },
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match self {
            Primitive::Frustum {
                base,
                base_radius,
                top,
                top_radius,
            } => {
                let r = base_radius.max(*top_radius);
                let lo = base.min(*top) - DVec3::splat(r);
                let hi = base.max(*top) + DVec3::splat(r);
                Some(BoundingBox { min: lo, max: hi })
            }
            Primitive::Sphere { center, radius } => Some(BoundingBox {
                min: *center - DVec3::splat(*radius),
                max: *center + DVec3::splat(*radius),
            }),
        }
    }

    pub fn tessellate(&self) -> TriangleMesh {
        match self {
            Primitive::Frustum {
                base,
                base_radius,
                top,
                top_radius,
            } => generate_frustum_mesh(*base, *base_radius, *top, *top_radius),
            Primitive::Sphere { center, radius } => generate_sphere_mesh(*center, *radius),
        }
    }
}

/// Constructive solid geometry tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Csg {
    Primitive(Primitive),
    Union(Vec<Csg>),
    Difference(Box<Csg>, Box<Csg>),
}

impl From<Primitive> for Csg {
    fn from(primitive: Primitive) -> Self {
        Csg::Primitive(primitive)
    }
}

impl Csg {
    pub fn union(parts: impl IntoIterator<Item = Csg>) -> Self {
        Csg::Union(parts.into_iter().collect())
    }

    pub fn difference(self, tool: Csg) -> Self {
        Csg::Difference(Box::new(self), Box::new(tool))
    }

    /// Leaves contributing material (the right side of a difference is skipped)
    pub fn solid_primitives(&self) -> Vec<&Primitive> {
        let mut out = Vec::new();
        self.collect_solid(&mut out);
        out
    }

    fn collect_solid<'a>(&'a self, out: &mut Vec<&'a Primitive>) {
        match self {
            Csg::Primitive(primitive) => out.push(primitive),
            Csg::Union(parts) => parts.iter().for_each(|part| part.collect_solid(out)),
            Csg::Difference(body, _) => body.collect_solid(out),
        }
    }

    pub fn transformed(&self, transform: &DAffine3) -> Self {
        match self {
            Csg::Primitive(primitive) => Csg::Primitive(primitive.transformed(transform)),
            Csg::Union(parts) => Csg::Union(parts.iter().map(|p| p.transformed(transform)).collect()),
            Csg::Difference(body, tool) => Csg::Difference(
                Box::new(body.transformed(transform)),
                Box::new(tool.transformed(transform)),
            ),
        }
    }
}

/// A CSG tree built in local coordinates and its placement in the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub csg: Csg,
    pub placement: DAffine3,
}

impl Shape {
    pub fn new(csg: impl Into<Csg>) -> Self {
        Self {
            csg: csg.into(),
            placement: DAffine3::IDENTITY,
        }
    }

    pub fn with_placement(mut self, placement: DAffine3) -> Self {
        self.placement = placement;
        self
    }

    /// Tree with the placement baked in
    pub fn world_csg(&self) -> Csg {
        self.csg.transformed(&self.placement)
    }

    /// Approximate display mesh made of the material-contributing leaves
    pub fn tessellate(&self) -> TriangleMesh {
        let mut mesh = TriangleMesh::default();
        for primitive in self.world_csg().solid_primitives() {
            mesh.merge(&primitive.tessellate());
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_difference_skips_tool() {
        let csg = Csg::from(Primitive::sphere(DVec3::ZERO, 1.0))
            .difference(Primitive::cylinder(DVec3::ZERO, DVec3::Z, 1.01).into());
        assert_eq!(csg.solid_primitives().len(), 1);
    }

    #[test]
    fn test_shape_placement() {
        let shape = Shape::new(Primitive::sphere(DVec3::ZERO, 0.5))
            .with_placement(DAffine3::from_translation(DVec3::new(0.0, 0.0, 2.0)));
        let bb = shape.tessellate().bounding_box().unwrap();
        assert_relative_eq!(bb.center().z, 2.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max.z, 2.5, epsilon = 1e-9);
    }
}
