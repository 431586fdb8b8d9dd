//! Prongs between neighbouring gemstones and prongs at points

use glam::{DAffine3, DVec3};
use serde::{Deserialize, Serialize};

use super::build_pairs;
use crate::error::{JewelryResult, check_range};
use crate::gemstone::GemstoneInfo;
use crate::geometry::{Frame3D, Surface};
use crate::shape::{Csg, Primitive, Shape};

/// Ratios are relative to the average diameter of the two gemstones
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProngParams {
    pub size_ratio: f64,
    pub height_ratio: f64,
    pub width_between_prongs_ratio: f64,
    pub max_gap: f64,
    pub weld_distance: f64,
}

impl Default for ProngParams {
    fn default() -> Self {
        Self {
            size_ratio: 0.35,
            height_ratio: 0.3,
            width_between_prongs_ratio: 0.65,
            max_gap: 0.05,
            weld_distance: 0.03,
        }
    }
}

impl ProngParams {
    pub fn validate(&self) -> JewelryResult<()> {
        check_range("sizeRatio", self.size_ratio, 0.1, 0.5)?;
        check_range("heightRatio", self.height_ratio, 0.1, 1.0)?;
        check_range("widthBetweenProngsRatio", self.width_between_prongs_ratio, 0.1, 1.0)?;
        check_range("maxGap", self.max_gap, 0.0, f64::MAX)?;
        check_range("weldDistance", self.weld_distance, 0.0, 0.5)?;
        Ok(())
    }
}

/// Everything needed to build one prong body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProngInfo {
    /// Centre of the prong axis
    pub position: DVec3,
    /// Height direction
    pub normal: DVec3,
    pub length_direction: DVec3,
    pub width_direction: DVec3,
    /// Diameter
    pub size: f64,
    /// Half the axis length; the tip sits `height` above `position`
    pub height: f64,
}

impl ProngInfo {
    pub fn frame(&self) -> Frame3D {
        Frame3D::from_normal_and_tangent(self.position, self.normal, self.length_direction)
    }

    pub fn tip(&self) -> DVec3 {
        self.position + self.normal.normalize_or_zero() * self.height
    }

    /// Cylinder spanning `-height..height`; a rounded prong ends in a sphere
    /// whose top touches `height`
    pub fn shape(&self, flat: bool) -> Shape {
        let radius = self.size / 2.0;
        let bottom = DVec3::new(0.0, 0.0, -self.height);
        let csg = if flat {
            Csg::from(Primitive::cylinder(bottom, DVec3::new(0.0, 0.0, self.height), radius))
        } else {
            let top = DVec3::new(0.0, 0.0, self.height - radius);
            Csg::union([
                Primitive::sphere(top, radius).into(),
                Primitive::cylinder(bottom, top, radius).into(),
            ])
        };
        let placement: DAffine3 = self.frame().to_affine();
        Shape::new(csg).with_placement(placement)
    }
}

/// Two prongs per connected pair, welded where they nearly coincide
pub fn prongs_between(gemstones: &[GemstoneInfo], params: &ProngParams) -> JewelryResult<Vec<ProngInfo>> {
    params.validate()?;
    let edges = build_pairs(gemstones, params.max_gap)?;

    let mut prongs = Vec::with_capacity(edges.len() * 2);
    for edge in &edges {
        let (first, second) = (&gemstones[edge.a], &gemstones[edge.b]);
        let Some(axis) = (second.centroid - first.centroid).try_normalize() else {
            tracing::warn!("Skipping coincident gemstones {} and {}", edge.a, edge.b);
            continue;
        };

        let average_diameter = first.radius + second.radius;
        let size = average_diameter * params.size_ratio;
        let height = average_diameter * params.height_ratio;

        let first_girdle = first.centroid + axis * first.radius;
        let second_girdle = second.centroid - axis * second.radius;
        let midpoint = (first_girdle + second_girdle) * 0.5;

        let normal = (first.normalized_normal() + second.normalized_normal()) / 2.0;
        let Some(normal) = normal.try_normalize() else {
            tracing::warn!("Gemstones {} and {} face opposite ways", edge.a, edge.b);
            continue;
        };
        let Some(perpendicular) = axis.cross(normal).try_normalize() else {
            tracing::warn!("Gemstones {} and {} are stacked along their normal", edge.a, edge.b);
            continue;
        };

        let half_width = average_diameter * params.width_between_prongs_ratio * 0.5;
        for side in [-1.0, 1.0] {
            prongs.push(ProngInfo {
                position: midpoint + perpendicular * (half_width * side),
                normal,
                length_direction: axis,
                width_direction: perpendicular,
                size,
                height,
            });
        }
    }

    if params.weld_distance > 0.0 && prongs.len() > 1 {
        prongs = weld_prongs(prongs, params.weld_distance);
    }
    Ok(prongs)
}

fn find(parent: &mut [usize], mut index: usize) -> usize {
    while parent[index] != index {
        parent[index] = parent[parent[index]];
        index = parent[index];
    }
    index
}

fn average_direction(vectors: impl Iterator<Item = DVec3>, fallback: DVec3) -> DVec3 {
    vectors.sum::<DVec3>().try_normalize().unwrap_or(fallback)
}

/// Merge prongs closer than `weld_distance` (transitively) into their average
pub fn weld_prongs(prongs: Vec<ProngInfo>, weld_distance: f64) -> Vec<ProngInfo> {
    let count = prongs.len();
    let mut parent: Vec<usize> = (0..count).collect();
    for i in 0..count {
        for j in i + 1..count {
            if prongs[i].position.distance(prongs[j].position) < weld_distance {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    // Groups in order of their first member
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for index in 0..count {
        let root = find(&mut parent, index);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(index),
            None => groups.push((root, vec![index])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| {
            if members.len() == 1 {
                return prongs[members[0]];
            }
            let n = members.len() as f64;
            let group = || members.iter().map(|&i| &prongs[i]);
            let reference = &prongs[members[0]];
            ProngInfo {
                position: group().map(|p| p.position).sum::<DVec3>() / n,
                normal: average_direction(group().map(|p| p.normal), reference.normal),
                length_direction: average_direction(
                    group().map(|p| p.length_direction),
                    reference.length_direction,
                ),
                width_direction: average_direction(
                    group().map(|p| p.width_direction),
                    reference.width_direction,
                ),
                size: group().map(|p| p.size).sum::<f64>() / n,
                height: group().map(|p| p.height).sum::<f64>() / n,
            }
        })
        .collect()
}

/// Inputs for a single prong standing on a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProngAtPointParams {
    pub size: f64,
    pub height: f64,
    pub flat: bool,
}

impl Default for ProngAtPointParams {
    fn default() -> Self {
        Self {
            size: 0.08,
            height: 0.1,
            flat: true,
        }
    }
}

/// Prong centred on the face point nearest to `point`, along the face normal
pub fn prong_at_point(
    surface: &dyn Surface,
    point: DVec3,
    params: &ProngAtPointParams,
) -> JewelryResult<ProngInfo> {
    check_range("size", params.size, 1e-6, f64::MAX)?;
    check_range("height", params.height, 1e-6, f64::MAX)?;
    let frame = surface.evaluate(point);
    Ok(ProngInfo {
        position: frame.origin,
        normal: frame.z_axis,
        length_direction: frame.x_axis,
        width_direction: frame.y_axis,
        size: params.size,
        height: params.height,
    })
}
