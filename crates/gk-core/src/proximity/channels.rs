//! Channels joining neighbouring gemstones

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::build_pairs;
use crate::error::{JewelryResult, check_range};
use crate::gemstone::GemstoneInfo;
use crate::shape::{Csg, Primitive, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Channel diameter relative to the smaller gemstone diameter
    pub ratio: f64,
    pub max_gap: f64,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            ratio: 0.35,
            max_gap: 0.05,
        }
    }
}

impl ChannelParams {
    pub fn validate(&self) -> JewelryResult<()> {
        check_range("ratio", self.ratio, 0.05, 1.0)?;
        check_range("maxGap", self.max_gap, 0.0, f64::MAX)?;
        Ok(())
    }
}

/// Straight channel between two gemstone centres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSegment {
    pub start: DVec3,
    pub end: DVec3,
    pub radius: f64,
}

impl ChannelSegment {
    pub fn primitive(&self) -> Primitive {
        Primitive::cylinder(self.start, self.end, self.radius)
    }
}

/// Centre of the gemstone with its depth offset undone, i.e. back on the seat level
fn seat_center(gemstone: &GemstoneInfo) -> DVec3 {
    gemstone.centroid - gemstone.seat_normal() * gemstone.total_depth_offset()
}

/// One segment per connected pair
pub fn channels_between(
    gemstones: &[GemstoneInfo],
    params: &ChannelParams,
) -> JewelryResult<Vec<ChannelSegment>> {
    params.validate()?;
    let edges = build_pairs(gemstones, params.max_gap)?;

    Ok(edges
        .iter()
        .map(|edge| {
            let (first, second) = (&gemstones[edge.a], &gemstones[edge.b]);
            let diameter = first.diameter().min(second.diameter());
            ChannelSegment {
                start: seat_center(first),
                end: seat_center(second),
                radius: params.ratio * diameter / 2.0,
            }
        })
        .collect())
}

/// All segments of one invocation as a single solid
pub fn channel_shape(segments: &[ChannelSegment]) -> Shape {
    Shape::new(Csg::union(segments.iter().map(|s| Csg::from(s.primitive()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemstone::GemstoneRecord;
    use crate::proximity::tests::row;
    use approx::assert_relative_eq;

    #[test]
    fn test_channel_radius_uses_smaller_stone() {
        let mut gems = row(0.1, &[0.0, 0.14]);
        gems[1].radius = 0.04;
        let segments = channels_between(&gems, &ChannelParams::default()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_relative_eq!(segments[0].radius, 0.35 * 0.08 / 2.0);
    }

    #[test]
    fn test_unequal_stones_with_relative_depth() {
        let record = GemstoneRecord::new(0.1).with_depth_offsets(0.0, 0.1);
        let gems = vec![
            GemstoneInfo::new(DVec3::ZERO, DVec3::Z, 0.05).with_record(&record),
            GemstoneInfo::new(DVec3::new(0.18, 0.0, 0.0), DVec3::Z, 0.1).with_record(&record),
        ];
        let segments = channels_between(&gems, &ChannelParams::default()).unwrap();

        assert_eq!(segments.len(), 1);
        assert_relative_eq!(segments[0].radius, 0.35 * 0.1 / 2.0, epsilon = 1e-12);
        assert_relative_eq!(segments[0].start.z, -0.01, epsilon = 1e-12);
        assert_relative_eq!(segments[0].end.z, -0.02, epsilon = 1e-12);
        assert_relative_eq!(segments[0].end.x, 0.18, epsilon = 1e-12);
    }

    #[test]
    fn test_depth_offset_is_undone() {
        let record = GemstoneRecord::new(0.1).with_depth_offsets(0.02, 0.0);
        let gems: Vec<GemstoneInfo> = row(0.1, &[0.0, 0.15])
            .into_iter()
            .map(|g| g.with_record(&record))
            .collect();
        let segments = channels_between(&gems, &ChannelParams::default()).unwrap();
        assert_relative_eq!(segments[0].start.z, -0.02);
        assert_relative_eq!(segments[0].end.x, 0.15);
        assert_eq!(channel_shape(&segments).csg.solid_primitives().len(), 1);
    }
}
