//! Sampling of the unfold source into a triangle patch

use glam::DVec2;

use crate::constants::{UNFOLD_DEFAULT_STEP, UNFOLD_GRID_MAX, UNFOLD_GRID_MIN, UNFOLD_MIN_STEP};
use crate::error::{JewelryError, JewelryResult};
use crate::geometry::{Surface, TriangleMesh};

use super::{UnfoldAlgorithm, UnfoldSource};

/// Grid step implied by the user accuracy, floored at [`UNFOLD_MIN_STEP`]
pub fn sampling_step(accuracy: f64) -> f64 {
    if accuracy.is_finite() && accuracy > 0.0 {
        accuracy.max(UNFOLD_MIN_STEP)
    } else {
        UNFOLD_DEFAULT_STEP
    }
}

pub(crate) fn sample(
    source: &UnfoldSource<'_>,
    algorithm: UnfoldAlgorithm,
    accuracy: f64,
) -> JewelryResult<TriangleMesh> {
    let step = sampling_step(accuracy);
    let mesh = match (source, algorithm) {
        (UnfoldSource::Mesh(mesh), _) => {
            let mut mesh = (*mesh).clone();
            if mesh.normals.len() != mesh.vertices.len() {
                mesh.compute_vertex_normals();
            }
            mesh
        }
        (UnfoldSource::Surface(surface), UnfoldAlgorithm::Mesh) => surface.tessellate(step),
        (UnfoldSource::Surface(surface), UnfoldAlgorithm::Nurbs) => parametric_grid(*surface, step),
    };

    if mesh.vertices.len() < 3 || mesh.triangles.is_empty() {
        return Err(JewelryError::DegenerateGeometry(
            "unfold source produced no triangles".into(),
        ));
    }
    tracing::debug!(
        vertices = mesh.vertices.len(),
        triangles = mesh.triangles.len(),
        ?algorithm,
        "sampled unfold source"
    );
    Ok(mesh)
}

/// Uniform `(u, v)` grid sized from the corner distances of the face.
///
/// Grid nodes outside the trimmed face are dropped together with every
/// triangle touching them.
fn parametric_grid(surface: &dyn Surface, step: f64) -> TriangleMesh {
    let (min, max) = surface.parameter_range();
    let corner = |u: f64, v: f64| surface.point_at_parameter(DVec2::new(u, v));
    let (c00, c10) = (corner(min.x, min.y), corner(max.x, min.y));
    let (c01, c11) = (corner(min.x, max.y), corner(max.x, max.y));

    let u_dist = (c00.distance(c10) + c01.distance(c11)) / 2.0;
    let v_dist = (c00.distance(c01) + c10.distance(c11)) / 2.0;
    let steps = |dist: f64| ((dist / step) as usize + 1).clamp(UNFOLD_GRID_MIN, UNFOLD_GRID_MAX);
    let (nu, nv) = (steps(u_dist), steps(v_dist));

    let du = (max.x - min.x) / (nu - 1) as f64;
    let dv = (max.y - min.y) / (nv - 1) as f64;

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut grid = vec![None; nu * nv];
    for j in 0..nv {
        for i in 0..nu {
            let uv = DVec2::new(min.x + i as f64 * du, min.y + j as f64 * dv);
            if !surface.is_parameter_on_face(uv) {
                continue;
            }
            grid[j * nu + i] = Some(vertices.len());
            vertices.push(surface.point_at_parameter(uv));
            normals.push(surface.normal_at_parameter(uv));
        }
    }

    let mut triangles = Vec::new();
    for j in 0..nv - 1 {
        for i in 0..nu - 1 {
            let i00 = grid[j * nu + i];
            let i10 = grid[j * nu + i + 1];
            let i01 = grid[(j + 1) * nu + i];
            let i11 = grid[(j + 1) * nu + i + 1];
            if let (Some(a), Some(b), Some(c)) = (i00, i10, i01) {
                triangles.push([a, b, c]);
            }
            if let (Some(a), Some(b), Some(c)) = (i10, i11, i01) {
                triangles.push([a, b, c]);
            }
        }
    }

    TriangleMesh {
        vertices,
        normals,
        triangles,
    }
}
