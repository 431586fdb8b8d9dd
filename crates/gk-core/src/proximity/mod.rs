//! Proximity graph between placed gemstones
//!
//! Pairs of gemstones whose surface-to-surface gap is within a threshold
//! drive prong and channel generation.

mod channels;
mod prongs;

pub use channels::{ChannelParams, ChannelSegment, channel_shape, channels_between};
pub use prongs::{
    ProngAtPointParams, ProngInfo, ProngParams, prong_at_point, prongs_between, weld_prongs,
};

use serde::{Deserialize, Serialize};

use crate::error::{JewelryError, JewelryResult, check_range};
use crate::gemstone::GemstoneInfo;

/// Two gemstones within the gap threshold, by index into the input slice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityEdge {
    pub a: usize,
    pub b: usize,
    /// Centre distance minus both radii
    pub gap: f64,
}

/// Every unordered pair whose gap is at most `max_gap`, in index order
pub fn build_pairs(gemstones: &[GemstoneInfo], max_gap: f64) -> JewelryResult<Vec<ProximityEdge>> {
    if gemstones.len() < 2 {
        return Err(JewelryError::InsufficientGemstones {
            found: gemstones.len(),
        });
    }
    check_range("maxGap", max_gap, 0.0, f64::MAX)?;

    let mut edges = Vec::new();
    for (i, first) in gemstones.iter().enumerate() {
        for (j, second) in gemstones.iter().enumerate().skip(i + 1) {
            let gap = first.centroid.distance(second.centroid) - first.radius - second.radius;
            if gap <= max_gap + 1e-9 {
                edges.push(ProximityEdge { a: i, b: j, gap });
            }
        }
    }

    tracing::debug!(
        "Found {} connections between {} gemstones",
        edges.len(),
        gemstones.len()
    );
    Ok(edges)
}
