//! Geometry sampling: curves, frames, surfaces, meshes and selections

mod curve;
mod frame;
mod mesh;
mod selection;
mod surface;

pub use curve::{Circle, CircularArc, Curve3D, Polyline3D};
pub use frame::{Frame3D, Plane};
pub use mesh::{BoundingBox, TriangleMesh};
pub use selection::SelectionEntity;
pub use surface::{CylinderSurface, PlaneSurface, Surface, tessellate_grid};
