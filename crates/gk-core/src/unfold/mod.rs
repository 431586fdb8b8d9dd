//! Surface unfold and refold
//!
//! A face (or a mesh body) is sampled into a triangle patch, flattened onto a
//! construction plane, and the flat/source correspondence is kept as an
//! [`UnfoldMapping`]. Refold walks the mapping backwards to carry flat
//! geometry back onto the source surface.

mod flatten;
mod mapping;
mod refold;
mod sampling;

use std::fmt;
use std::str::FromStr;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Deserializer, Serialize};

use crate::choice::{deserialize_choice, list_position};
use crate::constants::UNFOLD_DEFAULT_ACCURACY;
use crate::error::{JewelryError, JewelryResult};
use crate::geometry::{Plane, Surface, TriangleMesh};

pub use mapping::{
    LEGACY_SOURCE_DATA_ATTRIBUTE, SurfaceSample, UNFOLD_MAPPING_ATTRIBUTE, UnfoldMapping,
};
pub use refold::{refold_mesh, refold_point, refold_transform};
pub use sampling::sampling_step;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum UnfoldAlgorithm {
    /// Tessellate the face with edges no longer than the accuracy
    #[default]
    Mesh,
    /// Uniform grid over the face parameter space
    Nurbs,
}

impl UnfoldAlgorithm {
    pub const ALL: [UnfoldAlgorithm; 2] = [UnfoldAlgorithm::Mesh, UnfoldAlgorithm::Nurbs];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for UnfoldAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfoldAlgorithm::Mesh => f.write_str("Mesh"),
            UnfoldAlgorithm::Nurbs => f.write_str("NURBS"),
        }
    }
}

impl FromStr for UnfoldAlgorithm {
    type Err = JewelryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = list_position(s) {
            return position.ok().and_then(Self::from_index).ok_or_else(|| {
                JewelryError::InvalidParameter(format!("unfold algorithm index {} out of range", s.trim()))
            });
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "mesh" => Ok(UnfoldAlgorithm::Mesh),
            "nurbs" => Ok(UnfoldAlgorithm::Nurbs),
            other => Err(JewelryError::InvalidParameter(format!(
                "unknown unfold algorithm '{}'",
                other
            ))),
        }
    }
}

/// Saved as the algorithm name or as the drop-down position
impl<'de> Deserialize<'de> for UnfoldAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_choice(deserializer)
    }
}

/// Points picked on the source: origin, +X and +Y of the flat pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfoldAnchors {
    pub origin: DVec3,
    pub x_direction: DVec3,
    pub y_direction: DVec3,
}

impl Default for UnfoldAnchors {
    fn default() -> Self {
        Self {
            origin: DVec3::ZERO,
            x_direction: DVec3::X,
            y_direction: DVec3::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnfoldOptions {
    pub accuracy: f64,
    pub algorithm: UnfoldAlgorithm,
    pub x_offset: f64,
    pub y_offset: f64,
    /// Construction plane receiving the pattern
    pub plane: Plane,
}

impl Default for UnfoldOptions {
    fn default() -> Self {
        Self {
            accuracy: UNFOLD_DEFAULT_ACCURACY,
            algorithm: UnfoldAlgorithm::Mesh,
            x_offset: 0.0,
            y_offset: 0.0,
            plane: Plane::XY,
        }
    }
}

impl UnfoldOptions {
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_algorithm(mut self, algorithm: UnfoldAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_offsets(mut self, x_offset: f64, y_offset: f64) -> Self {
        self.x_offset = x_offset;
        self.y_offset = y_offset;
        self
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = plane;
        self
    }
}

/// What gets unfolded
#[derive(Debug, Clone, Copy)]
pub enum UnfoldSource<'a> {
    Surface(&'a dyn Surface),
    Mesh(&'a TriangleMesh),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnfoldOutput {
    pub mapping: UnfoldMapping,
    /// Pattern outline as pairs of mapping point indices
    pub boundary_edges: Vec<(usize, usize)>,
}

impl UnfoldOutput {
    /// Outline segments in world coordinates on the construction plane
    pub fn sketch_lines(&self) -> Vec<(DVec3, DVec3)> {
        let plane = &self.mapping.plane;
        let flat = &self.mapping.flat_points;
        self.boundary_edges
            .iter()
            .map(|&(a, b)| (plane.from_local(flat[a]), plane.from_local(flat[b])))
            .collect()
    }
}

/// Flatten `source` onto the construction plane of `options`.
///
/// The sample nearest to `anchors.origin` lands on the plane origin (plus
/// offsets), the sample nearest to `anchors.x_direction` on the +X axis, and
/// the pattern is mirrored if needed so `anchors.y_direction` ends up on +Y.
pub fn unfold(
    source: &UnfoldSource<'_>,
    anchors: &UnfoldAnchors,
    options: &UnfoldOptions,
) -> JewelryResult<UnfoldOutput> {
    let mesh = sampling::sample(source, options.algorithm, options.accuracy)?;
    let origin = nearest_vertex(&mesh.vertices, anchors.origin);
    let x_index = nearest_vertex(&mesh.vertices, anchors.x_direction);
    let y_index = nearest_vertex(&mesh.vertices, anchors.y_direction);

    let flat = flatten::flatten(&mesh, origin);

    let mut angle = 0.0;
    let mut reflect = false;
    if let Some(px) = flat.positions[x_index] {
        angle = -px.y.atan2(px.x);
        if let Some(py) = flat.positions[y_index] {
            reflect = py.x * angle.sin() + py.y * angle.cos() < 0.0;
        }
    }
    let (sin, cos) = angle.sin_cos();
    let offset = DVec2::new(options.x_offset, options.y_offset);

    let mut remap = vec![None; mesh.vertices.len()];
    let mut flat_points = Vec::new();
    let mut source_points = Vec::new();
    let mut source_normals = Vec::new();
    for (index, position) in flat.positions.iter().enumerate() {
        let Some(p) = position else {
            continue;
        };
        let mut rotated = DVec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos);
        if reflect {
            rotated.y = -rotated.y;
        }
        remap[index] = Some(flat_points.len());
        flat_points.push(rotated + offset);
        source_points.push(mesh.vertices[index]);
        source_normals.push(mesh.normals.get(index).copied().unwrap_or(DVec3::Z));
    }

    let triangles: Vec<[usize; 3]> = mesh
        .triangles
        .iter()
        .zip(&flat.visited)
        .filter(|(_, visited)| **visited)
        .filter_map(|(t, _)| Some([remap[t[0]]?, remap[t[1]]?, remap[t[2]]?]))
        .collect();
    if triangles.is_empty() {
        return Err(JewelryError::DegenerateGeometry(
            "unfold produced no flat triangles".into(),
        ));
    }
    let skipped = mesh.triangles.len() - triangles.len();
    if skipped > 0 {
        tracing::warn!("{} triangles are not connected to the unfold origin", skipped);
    }

    let mapping = UnfoldMapping {
        anchors: *anchors,
        plane: options.plane,
        accuracy: options.accuracy,
        algorithm: options.algorithm,
        flat_points,
        source_points,
        source_normals,
        triangles,
    };
    let boundary_edges = TriangleMesh {
        vertices: mapping.source_points.clone(),
        normals: Vec::new(),
        triangles: mapping.triangles.clone(),
    }
    .boundary_edges();

    tracing::info!(
        "Unfolded {} samples into {} triangles",
        mapping.flat_points.len(),
        mapping.triangles.len()
    );
    Ok(UnfoldOutput {
        mapping,
        boundary_edges,
    })
}

fn nearest_vertex(vertices: &[DVec3], target: DVec3) -> usize {
    vertices
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.distance_squared(target).total_cmp(&b.1.distance_squared(target)))
        .map(|(index, _)| index)
        .unwrap_or(0)
}
