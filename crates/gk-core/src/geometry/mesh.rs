//! Indexed triangle meshes

use std::collections::HashMap;

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |bb, p| Self {
            min: bb.min.min(*p),
            max: bb.max.max(*p),
        }))
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Triangle mesh with per-vertex normals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec3>,
    pub normals: Vec<DVec3>,
    pub triangles: Vec<[usize; 3]>,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[usize; 3]>) -> Self {
        let mut mesh = Self {
            vertices,
            normals: Vec::new(),
            triangles,
        };
        mesh.compute_vertex_normals();
        mesh
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn face_normal(&self, triangle: usize) -> DVec3 {
        let [a, b, c] = self.triangles[triangle];
        let (a, b, c) = (self.vertices[a], self.vertices[b], self.vertices[c]);
        (b - a).cross(c - a).normalize_or_zero()
    }

    pub fn triangle_area(&self, triangle: usize) -> f64 {
        let [a, b, c] = self.triangles[triangle];
        let (a, b, c) = (self.vertices[a], self.vertices[b], self.vertices[c]);
        (b - a).cross(c - a).length() * 0.5
    }

    /// Vertex normals as the normalized average of adjacent face normals
    pub fn compute_vertex_normals(&mut self) {
        let mut normals = vec![DVec3::ZERO; self.vertices.len()];
        for triangle in 0..self.triangles.len() {
            let normal = self.face_normal(triangle);
            for &index in &self.triangles[triangle] {
                normals[index] += normal;
            }
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(DVec3::Z))
            .collect();
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices)
    }

    /// Mean vertex position
    pub fn centroid(&self) -> DVec3 {
        if self.vertices.is_empty() {
            return DVec3::ZERO;
        }
        self.vertices.iter().sum::<DVec3>() / self.vertices.len() as f64
    }

    /// Triangles adjacent to each undirected edge, keyed `(min, max)`
    pub fn edge_to_triangles(&self) -> HashMap<(usize, usize), Vec<usize>> {
        let mut edges: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (index, &[a, b, c]) in self.triangles.iter().enumerate() {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                edges.entry((p.min(q), p.max(q))).or_default().push(index);
            }
        }
        edges
    }

    /// Edges used by exactly one triangle, sorted for stable output
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self
            .edge_to_triangles()
            .into_iter()
            .filter(|(_, triangles)| triangles.len() == 1)
            .map(|(edge, _)| edge)
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn transform(&mut self, transform: &DAffine3) {
        for vertex in &mut self.vertices {
            *vertex = transform.transform_point3(*vertex);
        }
        for normal in &mut self.normals {
            *normal = transform.transform_vector3(*normal).normalize_or_zero();
        }
    }

    pub fn transformed(mut self, transform: &DAffine3) -> Self {
        self.transform(transform);
        self
    }

    /// Append another mesh, reindexing its triangles
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|t| [t[0] + offset, t[1] + offset, t[2] + offset]),
        );
    }
}
