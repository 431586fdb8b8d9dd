//! Persisted flat-to-surface correspondence

use std::collections::BTreeMap;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::constants::BARYCENTRIC_MARGIN;
use crate::error::{JewelryError, JewelryResult};
use crate::geometry::Plane;

use super::{UnfoldAlgorithm, UnfoldAnchors};

/// Attribute name under which the mapping is attached to the sketch
pub const UNFOLD_MAPPING_ATTRIBUTE: &str = "unfoldMapping";

/// Attribute name of the legacy keyed point map
pub const LEGACY_SOURCE_DATA_ATTRIBUTE: &str = "sourceData";

/// Interpolated surface point and normal for a flat position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: DVec3,
    pub normal: DVec3,
}

/// Flat pattern samples and their source points on the unfolded face.
///
/// `flat_points` are construction-plane coordinates (offsets included).
/// `triangles` index all three point lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfoldMapping {
    pub anchors: UnfoldAnchors,
    pub plane: Plane,
    pub accuracy: f64,
    pub algorithm: UnfoldAlgorithm,
    pub flat_points: Vec<DVec2>,
    pub source_points: Vec<DVec3>,
    pub source_normals: Vec<DVec3>,
    pub triangles: Vec<[usize; 3]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyPointData {
    #[serde(rename = "sourcePoint3D")]
    source_point_3d: Option<String>,
    source_normal: Option<String>,
}

impl UnfoldMapping {
    pub fn to_json(&self) -> JewelryResult<String> {
        serde_json::to_string(self).map_err(|e| JewelryError::Schema(e.to_string()))
    }

    pub fn from_json(json: &str) -> JewelryResult<Self> {
        let mapping: Self =
            serde_json::from_str(json).map_err(|e| JewelryError::Schema(e.to_string()))?;
        let n = mapping.flat_points.len();
        if mapping.source_points.len() != n || mapping.source_normals.len() != n {
            return Err(JewelryError::Schema(
                "unfold mapping point lists differ in length".into(),
            ));
        }
        if mapping.triangles.iter().flatten().any(|&i| i >= n) {
            return Err(JewelryError::Schema(
                "unfold mapping triangle index out of range".into(),
            ));
        }
        Ok(mapping)
    }

    /// Read the keyed map written by early releases.
    ///
    /// Keys are world points on the construction plane (`"x,y,z"`), values
    /// hold the source point (`"x,y,z"`) and normal (`"x;y;z"`). Entries that
    /// fail to parse are skipped. The map carries no triangles, so lookups
    /// fall back to the nearest-neighbour fan.
    pub fn from_legacy(json: &str, anchors: UnfoldAnchors, plane: Plane) -> JewelryResult<Self> {
        let entries: BTreeMap<String, LegacyPointData> =
            serde_json::from_str(json).map_err(|e| JewelryError::Schema(e.to_string()))?;

        let mut mapping = Self {
            anchors,
            plane,
            accuracy: crate::constants::UNFOLD_DEFAULT_ACCURACY,
            algorithm: UnfoldAlgorithm::Mesh,
            flat_points: Vec::new(),
            source_points: Vec::new(),
            source_normals: Vec::new(),
            triangles: Vec::new(),
        };
        for (key, data) in entries {
            let Some(flat) = parse_triple(&key, ',') else {
                continue;
            };
            let Some(source) = data.source_point_3d.as_deref().and_then(|s| parse_triple(s, ',')) else {
                continue;
            };
            let normal = data
                .source_normal
                .as_deref()
                .and_then(|s| parse_triple(s, ';'))
                .and_then(|n| n.try_normalize())
                .unwrap_or(DVec3::Z);
            mapping.flat_points.push(plane.to_local(flat));
            mapping.source_points.push(source);
            mapping.source_normals.push(normal);
        }
        if mapping.flat_points.is_empty() {
            return Err(JewelryError::Schema("legacy unfold data has no points".into()));
        }
        Ok(mapping)
    }

    pub fn is_empty(&self) -> bool {
        self.flat_points.is_empty()
    }

    /// Surface point and normal under a flat position.
    ///
    /// Uses barycentric weights of the flat triangle containing `flat`.
    /// Positions outside every triangle are rejected.
    pub fn locate(&self, flat: DVec2) -> JewelryResult<SurfaceSample> {
        let hit = if self.triangles.is_empty() {
            self.locate_in_fan(flat)
        } else {
            self.locate_in_triangles(flat)
        };
        let (triangle, weights) = hit.ok_or_else(|| {
            JewelryError::OutOfBoundsUnfold(format!(
                "({:.4}, {:.4}) lies outside the unfolded patch",
                flat.x, flat.y
            ))
        })?;

        let mut position = DVec3::ZERO;
        let mut normal = DVec3::ZERO;
        for (&index, &weight) in triangle.iter().zip(weights.iter()) {
            position += self.source_points[index] * weight;
            normal += self.source_normals[index] * weight;
        }
        Ok(SurfaceSample {
            position,
            normal: normal.try_normalize().unwrap_or(DVec3::Z),
        })
    }

    fn locate_in_triangles(&self, flat: DVec2) -> Option<([usize; 3], [f64; 3])> {
        // Prefer the triangle the point is deepest inside
        self.triangles
            .iter()
            .filter_map(|&t| {
                let weights = self.barycentric(t, flat)?;
                let depth = weights.iter().copied().fold(f64::MAX, f64::min);
                Some((t, weights, depth))
            })
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(t, weights, _)| (t, weights))
    }

    /// Consecutive triples of the samples sorted by distance to `flat`
    fn locate_in_fan(&self, flat: DVec2) -> Option<([usize; 3], [f64; 3])> {
        let mut order: Vec<usize> = (0..self.flat_points.len()).collect();
        order.sort_by(|&a, &b| {
            flat.distance_squared(self.flat_points[a])
                .total_cmp(&flat.distance_squared(self.flat_points[b]))
        });
        order.windows(3).find_map(|w| {
            let t = [w[0], w[1], w[2]];
            self.barycentric(t, flat).map(|weights| (t, weights))
        })
    }

    fn barycentric(&self, [a, b, c]: [usize; 3], p: DVec2) -> Option<[f64; 3]> {
        let (pa, pb, pc) = (self.flat_points[a], self.flat_points[b], self.flat_points[c]);
        let denom = (pb.y - pc.y) * (pa.x - pc.x) + (pc.x - pb.x) * (pa.y - pc.y);
        if denom.abs() < 1e-12 {
            return None;
        }
        let wa = ((pb.y - pc.y) * (p.x - pc.x) + (pc.x - pb.x) * (p.y - pc.y)) / denom;
        let wb = ((pc.y - pa.y) * (p.x - pc.x) + (pa.x - pc.x) * (p.y - pc.y)) / denom;
        let wc = 1.0 - wa - wb;
        let inside = |w: f64| (-BARYCENTRIC_MARGIN..=1.0 + BARYCENTRIC_MARGIN).contains(&w);
        (inside(wa) && inside(wb) && inside(wc)).then_some([wa, wb, wc])
    }
}

fn parse_triple(text: &str, separator: char) -> Option<DVec3> {
    let mut parts = text.split(separator).map(|p| p.trim().parse::<f64>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(DVec3::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> UnfoldMapping {
        UnfoldMapping {
            anchors: UnfoldAnchors::default(),
            plane: Plane::XY,
            accuracy: 0.5,
            algorithm: UnfoldAlgorithm::Mesh,
            flat_points: vec![DVec2::ZERO, DVec2::X, DVec2::ONE, DVec2::Y],
            source_points: vec![
                DVec3::ZERO,
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(1.0, 0.0, 1.0),
                DVec3::new(0.0, 0.0, 1.0),
            ],
            source_normals: vec![DVec3::NEG_Y; 4],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        }
    }

    #[test]
    fn test_locate_interpolates() {
        let sample = square().locate(DVec2::new(0.25, 0.5)).unwrap();
        assert_relative_eq!(sample.position.x, 0.25, epsilon = 1e-12);
        assert_relative_eq!(sample.position.z, 0.5, epsilon = 1e-12);
        assert_relative_eq!(sample.normal.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_locate_outside_patch() {
        let result = square().locate(DVec2::new(1.5, 0.5));
        assert!(matches!(result, Err(JewelryError::OutOfBoundsUnfold(_))));
        // within the barycentric margin
        assert!(square().locate(DVec2::new(1.005, 0.5)).is_ok());
    }

    #[test]
    fn test_json_roundtrip_and_validation() {
        let mapping = square();
        let json = mapping.to_json().unwrap();
        assert_eq!(UnfoldMapping::from_json(&json).unwrap(), mapping);

        let mut broken = square();
        broken.triangles.push([0, 1, 9]);
        let json = broken.to_json().unwrap();
        assert!(matches!(
            UnfoldMapping::from_json(&json),
            Err(JewelryError::Schema(_))
        ));
    }

    #[test]
    fn test_legacy_map() {
        let json = r#"{
            "0.0000,0.0000,0.0000": {"sourcePoint3D": "0,0,0", "sourceNormal": "0;-1;0"},
            "1.0000,0.0000,0.0000": {"sourcePoint3D": "1,0,0", "sourceNormal": "0;-1;0"},
            "0.0000,1.0000,0.0000": {"sourcePoint3D": "0,0,1", "sourceNormal": "0;-1;0"},
            "bad": {"sourcePoint3D": "1,2"}
        }"#;
        let mapping = UnfoldMapping::from_legacy(json, UnfoldAnchors::default(), Plane::XY).unwrap();
        assert_eq!(mapping.flat_points.len(), 3);
        assert!(mapping.triangles.is_empty());
        let sample = mapping.locate(DVec2::new(0.2, 0.2)).unwrap();
        assert_relative_eq!(sample.position.x, 0.2, epsilon = 1e-12);
        assert_relative_eq!(sample.position.z, 0.2, epsilon = 1e-12);
    }
}
