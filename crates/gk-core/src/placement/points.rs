//! Gemstones at explicit points and circles

use glam::DVec3;

use super::Station;
use crate::constants::MINIMUM_GEMSTONE_SIZE;
use crate::error::{JewelryError, JewelryResult};
use crate::geometry::Circle;

fn check_size(size: f64) -> JewelryResult<()> {
    if !size.is_finite() || size < MINIMUM_GEMSTONE_SIZE {
        return Err(JewelryError::SizeBelowMinimum {
            size,
            minimum: MINIMUM_GEMSTONE_SIZE,
        });
    }
    Ok(())
}

/// One station of diameter `size` per point, in selection order
pub fn place_at_points(points: &[DVec3], size: f64) -> JewelryResult<Vec<Station>> {
    if points.is_empty() {
        return Err(JewelryError::InsufficientSelection(
            "select at least one point".into(),
        ));
    }
    check_size(size)?;
    Ok(points
        .iter()
        .enumerate()
        .map(|(i, &position)| Station {
            parameter: i as f64,
            position,
            size,
        })
        .collect())
}

/// One station per circle, at its centre with the circle's diameter
pub fn place_at_circles(circles: &[Circle]) -> JewelryResult<Vec<Station>> {
    if circles.is_empty() {
        return Err(JewelryError::InsufficientSelection(
            "select at least one circle".into(),
        ));
    }
    circles
        .iter()
        .enumerate()
        .map(|(i, circle)| {
            check_size(circle.diameter())?;
            Ok(Station {
                parameter: i as f64,
                position: circle.center,
                size: circle.diameter(),
            })
        })
        .collect()
}
