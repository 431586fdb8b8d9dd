//! Seat cutters for gemstones

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Deserializer, Serialize};

use crate::choice::{deserialize_choice, list_position};
use crate::error::{JewelryError, JewelryResult, check_range};
use crate::gemstone::GemstoneInfo;
use crate::geometry::Frame3D;
use crate::shape::{Csg, Primitive, Shape};

/// Shape of the cutter below the girdle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum CutterBottomType {
    /// Cone plus a through hole
    #[default]
    Hole,
    Cone,
    Hemisphere,
}

impl CutterBottomType {
    pub const ALL: [CutterBottomType; 3] = [
        CutterBottomType::Hole,
        CutterBottomType::Cone,
        CutterBottomType::Hemisphere,
    ];

    /// Position in the host's drop-down list
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for CutterBottomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CutterBottomType::Hole => "Hole",
            CutterBottomType::Cone => "Cone",
            CutterBottomType::Hemisphere => "Hemisphere",
        };
        f.write_str(name)
    }
}

impl FromStr for CutterBottomType {
    type Err = JewelryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = list_position(s) {
            return position
                .ok()
                .and_then(Self::from_index)
                .ok_or_else(|| JewelryError::InvalidParameter(format!("cutter bottom index {} out of range", s.trim())));
        }
        Self::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| JewelryError::InvalidParameter(format!("unknown cutter bottom '{}'", s)))
    }
}

/// Saved as the type name or as the drop-down position
impl<'de> Deserialize<'de> for CutterBottomType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_choice(deserializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutterParams {
    pub bottom_type: CutterBottomType,
    /// Height above the girdle
    pub height: f64,
    /// Hole depth below the girdle
    pub depth: f64,
    pub size_ratio: f64,
    pub hole_ratio: f64,
    /// Degrees
    pub cone_angle: f64,
}

impl Default for CutterParams {
    fn default() -> Self {
        Self {
            bottom_type: CutterBottomType::Hole,
            height: 0.04,
            depth: 0.15,
            size_ratio: 1.0,
            hole_ratio: 0.5,
            cone_angle: 41.0,
        }
    }
}

impl CutterParams {
    pub fn validate(&self) -> JewelryResult<()> {
        check_range("height", self.height, 0.0, f64::MAX)?;
        check_range("depth", self.depth, 0.0, f64::MAX)?;
        check_range("sizeRatio", self.size_ratio, 0.7, 1.3)?;
        check_range("holeRatio", self.hole_ratio, 0.2, 0.8)?;
        check_range("coneAngle", self.cone_angle, 30.0, 60.0)?;
        Ok(())
    }
}

/// Cutter solid for one gemstone.
///
/// Built around the bottom of the girdle with +Z along the crown direction:
/// a cylinder up to `height`, then the chosen bottom below.
pub fn cutter_shape(gemstone: &GemstoneInfo, params: &CutterParams) -> JewelryResult<Shape> {
    params.validate()?;
    if !gemstone.radius.is_finite() || gemstone.radius <= 0.0 {
        return Err(JewelryError::DegenerateGeometry("gemstone radius is zero".into()));
    }

    let radius = gemstone.radius * params.size_ratio;
    let mut parts: Vec<Csg> = vec![Primitive::cylinder(DVec3::ZERO, DVec3::new(0.0, 0.0, params.height), radius).into()];

    match params.bottom_type {
        CutterBottomType::Hemisphere => {
            let clip = Primitive::cylinder(DVec3::ZERO, DVec3::new(0.0, 0.0, radius), radius * 1.01);
            parts.push(Csg::from(Primitive::sphere(DVec3::ZERO, radius)).difference(clip.into()));
        }
        CutterBottomType::Cone | CutterBottomType::Hole => {
            let apex = radius * params.cone_angle.to_radians().tan();
            parts.push(Primitive::cone(DVec3::ZERO, radius, DVec3::new(0.0, 0.0, -apex)).into());
            if params.bottom_type == CutterBottomType::Hole {
                let bottom = (-radius).min(-params.depth);
                parts.push(
                    Primitive::cylinder(DVec3::ZERO, DVec3::new(0.0, 0.0, bottom), radius * params.hole_ratio)
                        .into(),
                );
            }
        }
    }

    let normal = gemstone.normalized_normal();
    let origin = gemstone.centroid - normal * (gemstone.girdle_thickness / 2.0);
    let frame = Frame3D::from_normal_and_tangent(origin, normal, DVec3::X);
    Ok(Shape::new(Csg::union(parts)).with_placement(frame.to_affine()))
}
