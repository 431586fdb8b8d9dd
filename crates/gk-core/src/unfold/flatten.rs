//! Discrete isometric flattening of a triangle patch.
//!
//! Triangles are laid out breadth-first from the one containing the origin
//! vertex, each new vertex placed from its two 3D edge lengths on the side
//! that does not fold over an already placed neighbour. A pass of
//! edge-length relaxation then spreads the accumulated error.

use std::collections::{HashMap, VecDeque};

use glam::DVec2;

use crate::constants::{MIN_TRIANGLE_HEIGHT, RELAXATION_ITERATIONS, RELAXATION_STIFFNESS};
use crate::geometry::TriangleMesh;

/// 2D position per mesh vertex (`None` when unreachable) and the triangles laid out
#[derive(Debug, Clone)]
pub(crate) struct Flattening {
    pub positions: Vec<Option<DVec2>>,
    pub visited: Vec<bool>,
}

pub(crate) fn flatten(mesh: &TriangleMesh, origin: usize) -> Flattening {
    let edges = mesh.edge_to_triangles();
    let points = &mesh.vertices;
    let triangles = &mesh.triangles;
    let mut positions = vec![None; points.len()];
    let mut visited = vec![false; triangles.len()];

    let start = triangles
        .iter()
        .position(|t| t.contains(&origin))
        .unwrap_or(0);
    let seed = triangles[start];
    let [i0, i1, i2] = match seed.iter().position(|&v| v == origin) {
        Some(k) => [seed[k], seed[(k + 1) % 3], seed[(k + 2) % 3]],
        None => seed,
    };

    let p0 = DVec2::ZERO;
    let p1 = DVec2::new(points[i0].distance(points[i1]), 0.0);
    positions[i0] = Some(p0);
    positions[i1] = Some(p1);
    positions[i2] = Some(third_point(
        p0,
        p1,
        points[i0].distance(points[i2]),
        points[i1].distance(points[i2]),
    ));

    visited[start] = true;
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let triangle = triangles[current];
        for k in 0..3 {
            let (u, v) = (triangle[k], triangle[(k + 1) % 3]);
            let Some(neighbours) = edges.get(&(u.min(v), u.max(v))) else {
                continue;
            };
            for &next in neighbours {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                queue.push_back(next);

                let next_triangle = triangles[next];
                let Some(w) = next_triangle.iter().copied().find(|&x| x != u && x != v) else {
                    continue;
                };
                if positions[w].is_some() {
                    continue;
                }
                let (Some(pu), Some(pv)) = (positions[u], positions[v]) else {
                    continue;
                };

                // Keep the winding of the next triangle
                let iu = next_triangle.iter().position(|&x| x == u).unwrap_or(0);
                let iv = next_triangle.iter().position(|&x| x == v).unwrap_or(0);
                let (a, b, pa, pb) = if (iu + 1) % 3 == iv {
                    (u, v, pu, pv)
                } else {
                    (v, u, pv, pu)
                };

                let candidates = both_sides(
                    pa,
                    pb,
                    points[a].distance(points[w]),
                    points[b].distance(points[w]),
                );
                positions[w] = Some(pick_side(
                    candidates,
                    (pa, pb),
                    neighbours,
                    triangles,
                    &visited,
                    &positions,
                ));
            }
        }
    }

    relax(&mut positions, mesh, &visited, i0);
    Flattening { positions, visited }
}

/// Apex of a triangle over `start → end` on its left, with a minimum height
fn third_point(start: DVec2, end: DVec2, d_start: f64, d_end: f64) -> DVec2 {
    let base = end - start;
    let length = base.length();
    if length == 0.0 {
        return start;
    }
    let a = (d_start * d_start - d_end * d_end + length * length) / (2.0 * length);
    let h_sq = d_start * d_start - a * a;
    let h = if h_sq < MIN_TRIANGLE_HEIGHT * MIN_TRIANGLE_HEIGHT {
        MIN_TRIANGLE_HEIGHT
    } else {
        h_sq.sqrt()
    };
    let dir = base / length;
    start + dir * a + dir.perp() * h
}

/// Both mirror-image apex candidates, left side first
fn both_sides(start: DVec2, end: DVec2, d_start: f64, d_end: f64) -> [DVec2; 2] {
    let base = end - start;
    let length = base.length();
    if length == 0.0 {
        return [start, start];
    }
    let a = (d_start * d_start - d_end * d_end + length * length) / (2.0 * length);
    let h = (d_start * d_start - a * a).max(0.0).sqrt();
    let dir = base / length;
    let foot = start + dir * a;
    [foot + dir.perp() * h, foot - dir.perp() * h]
}

fn pick_side(
    candidates: [DVec2; 2],
    edge: (DVec2, DVec2),
    neighbours: &[usize],
    triangles: &[[usize; 3]],
    visited: &[bool],
    positions: &[Option<DVec2>],
) -> DVec2 {
    let mut overlaps = [0usize; 2];
    for &t in neighbours {
        if !visited[t] {
            continue;
        }
        let [a, b, c] = triangles[t];
        let (Some(pa), Some(pb), Some(pc)) = (positions[a], positions[b], positions[c]) else {
            continue;
        };
        for (side, candidate) in candidates.iter().enumerate() {
            if triangles_overlap([edge.0, edge.1, *candidate], [pa, pb, pc]) {
                overlaps[side] += 1;
            }
        }
    }
    if overlaps[0] > overlaps[1] {
        candidates[1]
    } else {
        candidates[0]
    }
}

/// Separating-axis test; triangles that only touch do not overlap
pub(crate) fn triangles_overlap(first: [DVec2; 3], second: [DVec2; 3]) -> bool {
    const EPS: f64 = 1e-9;
    let project = |tri: &[DVec2; 3], axis: DVec2| {
        tri.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            let d = p.dot(axis);
            (lo.min(d), hi.max(d))
        })
    };
    for tri in [&first, &second] {
        for k in 0..3 {
            let axis = (tri[(k + 1) % 3] - tri[k]).perp();
            if axis.length_squared() < EPS * EPS {
                continue;
            }
            let (min_a, max_a) = project(&first, axis);
            let (min_b, max_b) = project(&second, axis);
            if max_a <= min_b + EPS || max_b <= min_a + EPS {
                return false;
            }
        }
    }
    true
}

/// Pull every laid-out edge toward its 3D length; `fixed` never moves
fn relax(positions: &mut [Option<DVec2>], mesh: &TriangleMesh, visited: &[bool], fixed: usize) {
    let mut targets: HashMap<(usize, usize), f64> = HashMap::new();
    for (t, triangle) in mesh.triangles.iter().enumerate() {
        if !visited[t] {
            continue;
        }
        for k in 0..3 {
            let (a, b) = (triangle[k], triangle[(k + 1) % 3]);
            let key = (a.min(b), a.max(b));
            if positions[key.0].is_some() && positions[key.1].is_some() {
                targets
                    .entry(key)
                    .or_insert_with(|| mesh.vertices[a].distance(mesh.vertices[b]));
            }
        }
    }
    let mut edges: Vec<((usize, usize), f64)> = targets.into_iter().collect();
    edges.sort_unstable_by_key(|(key, _)| *key);

    for _ in 0..RELAXATION_ITERATIONS {
        for &((a, b), target) in &edges {
            let (Some(pa), Some(pb)) = (positions[a], positions[b]) else {
                continue;
            };
            let delta = pb - pa;
            let current = delta.length();
            if current < 1e-9 {
                continue;
            }
            let correction = delta * ((current - target) * RELAXATION_STIFFNESS / current);
            let weight_a = if a == fixed { 0.0 } else { 1.0 };
            let weight_b = if b == fixed { 0.0 } else { 1.0 };
            let total = weight_a + weight_b;
            if total > 0.0 {
                positions[a] = Some(pa + correction * (weight_a / total));
                positions[b] = Some(pb - correction * (weight_b / total));
            }
        }
    }
}
