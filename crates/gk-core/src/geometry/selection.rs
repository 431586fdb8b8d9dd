//! Selectable host entities and their uniform conversions

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::{Circle, CircularArc, Curve3D, Polyline3D};
use crate::error::{JewelryError, JewelryResult};

/// A point- or curve-like entity picked by the user.
///
/// Coordinates are already in model space; sketch-local transforms are the
/// host's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectionEntity {
    SketchPoint { position: DVec3 },
    Vertex { position: DVec3 },
    ConstructionPoint { position: DVec3 },
    SketchLine { start: DVec3, end: DVec3 },
    SketchArc { start: DVec3, mid: DVec3, end: DVec3 },
    SketchCircle { center: DVec3, normal: DVec3, radius: f64 },
    /// Fit points of a spline, evaluated as a polyline
    SketchSpline { points: Vec<DVec3> },
    /// Tessellated model edge
    ModelEdge { points: Vec<DVec3> },
}

impl SelectionEntity {
    pub fn type_name(&self) -> &'static str {
        match self {
            SelectionEntity::SketchPoint { .. } => "SketchPoint",
            SelectionEntity::Vertex { .. } => "Vertex",
            SelectionEntity::ConstructionPoint { .. } => "ConstructionPoint",
            SelectionEntity::SketchLine { .. } => "SketchLine",
            SelectionEntity::SketchArc { .. } => "SketchArc",
            SelectionEntity::SketchCircle { .. } => "SketchCircle",
            SelectionEntity::SketchSpline { .. } => "SketchSpline",
            SelectionEntity::ModelEdge { .. } => "ModelEdge",
        }
    }

    pub fn to_point3d(&self) -> Option<DVec3> {
        match self {
            SelectionEntity::SketchPoint { position }
            | SelectionEntity::Vertex { position }
            | SelectionEntity::ConstructionPoint { position } => Some(*position),
            _ => None,
        }
    }

    pub fn to_curve3d(&self) -> JewelryResult<Box<dyn Curve3D>> {
        match self {
            SelectionEntity::SketchLine { start, end } => {
                Ok(Box::new(Polyline3D::line(*start, *end)?))
            }
            SelectionEntity::SketchArc { start, mid, end } => {
                Ok(Box::new(CircularArc::from_three_points(*start, *mid, *end)?))
            }
            SelectionEntity::SketchCircle { .. } => {
                let circle = self.to_circle().ok_or_else(|| {
                    JewelryError::DegenerateGeometry("circle radius is zero".into())
                })?;
                Ok(Box::new(CircularArc::full_circle(&circle)?))
            }
            SelectionEntity::SketchSpline { points } | SelectionEntity::ModelEdge { points } => {
                Ok(Box::new(Polyline3D::new(points.clone())?))
            }
            _ => Err(JewelryError::InsufficientSelection(format!(
                "{} is not a curve",
                self.type_name()
            ))),
        }
    }

    pub fn to_circle(&self) -> Option<Circle> {
        match self {
            SelectionEntity::SketchCircle {
                center,
                normal,
                radius,
            } if *radius > 0.0 => Some(Circle::new(*center, *normal, *radius)),
            _ => None,
        }
    }
}
