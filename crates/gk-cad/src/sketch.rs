//! Sketches produced by surface unfold

use glam::DVec3;
use gk_core::{BoundingBox, Plane};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A straight segment in model coordinates, lying on the sketch plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchLine {
    pub start: DVec3,
    pub end: DVec3,
}

/// A 2D sketch on a construction plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sketch {
    /// Unique identifier
    pub id: Uuid,
    /// Name of the sketch
    pub name: String,
    pub plane: Plane,
    pub lines: Vec<SketchLine>,
}

impl Sketch {
    /// Create a new empty sketch
    pub fn new(name: impl Into<String>, plane: Plane) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            plane,
            lines: Vec::new(),
        }
    }

    /// Replace the sketch content
    pub fn set_lines(&mut self, segments: impl IntoIterator<Item = (DVec3, DVec3)>) {
        self.lines = segments
            .into_iter()
            .map(|(start, end)| SketchLine { start, end })
            .collect();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.lines.iter().flat_map(|l| [&l.start, &l.end]))
    }
}
