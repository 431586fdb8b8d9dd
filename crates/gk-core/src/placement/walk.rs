//! Greedy station walk shared by curve and between-curve placement

use glam::DVec3;

use crate::constants::{
    GEMSTONE_OVERLAP_MERGE_THRESHOLD, MAX_STATIONS, SIZE_EPSILON, SPACING_REFINEMENT_ITERATIONS,
};

use super::Station;

/// Passes spent settling the size of leading extrapolated stones
const LEAD_SIZE_PASSES: usize = 4;

/// Walk over the interval `[start, end]` of a position coordinate.
///
/// `point` maps a position to model space (extrapolating as needed) and
/// `size` gives the interpolated, quantized size there. Stones outside
/// `bounds` reuse the size of the nearest in-bounds stone.
pub(crate) struct Walk<P, S> {
    pub point: P,
    pub size: S,
    pub start: f64,
    pub end: f64,
    pub gap: f64,
    pub bounds: Option<(f64, f64)>,
}

impl<P, S> Walk<P, S>
where
    P: Fn(f64) -> DVec3,
    S: Fn(f64) -> f64,
{
    /// Greedy stations, optionally redistributed uniformly, with the
    /// closing stone merged when it coincides with the first
    pub fn run(&self, uniform: bool) -> Vec<Station> {
        let mut lead = None;
        let mut stations = self.greedy(lead);

        if stations.iter().any(|s| self.is_before(s.0)) {
            for _ in 0..LEAD_SIZE_PASSES {
                let first_in_bounds = stations
                    .iter()
                    .find(|s| self.is_inside(s.0))
                    .map(|s| s.1);
                let settled = match (first_in_bounds, lead) {
                    (None, _) => true,
                    (Some(a), Some(b)) => (a - b).abs() < 1e-12,
                    (Some(_), None) => false,
                };
                if settled {
                    break;
                }
                lead = first_in_bounds;
                stations = self.greedy(lead);
            }
        }

        if uniform {
            self.redistribute(&mut stations);
        }

        let mut result: Vec<Station> = stations
            .into_iter()
            .map(|(parameter, size)| Station {
                parameter,
                position: (self.point)(parameter),
                size,
            })
            .collect();

        if result.len() > 1 {
            let first = result[0].position;
            let last = result[result.len() - 1].position;
            if first.distance(last) < GEMSTONE_OVERLAP_MERGE_THRESHOLD {
                result.pop();
            }
        }
        result
    }

    fn is_before(&self, position: f64) -> bool {
        self.bounds.is_some_and(|(lo, _)| position < lo - SIZE_EPSILON)
    }

    fn is_after(&self, position: f64) -> bool {
        self.bounds.is_some_and(|(_, hi)| position > hi + SIZE_EPSILON)
    }

    fn is_inside(&self, position: f64) -> bool {
        !self.is_before(position) && !self.is_after(position)
    }

    fn size_at(&self, position: f64, lead: Option<f64>, trail: Option<f64>) -> f64 {
        if self.is_before(position) {
            if let Some(size) = lead {
                return size;
            }
        } else if self.is_after(position) {
            if let Some(size) = trail {
                return size;
            }
        }
        (self.size)(position)
    }

    /// `(position, size)` pairs; a stone after the first is kept only while
    /// its right edge stays within the interval
    fn greedy(&self, lead: Option<f64>) -> Vec<(f64, f64)> {
        let mut stations = Vec::new();
        let mut current = self.start;
        let mut last_inside: Option<f64> = None;

        loop {
            let size = self.size_at(current, lead, last_inside);
            if !stations.is_empty() && current + size / 2.0 > self.end + SIZE_EPSILON {
                break;
            }
            if stations.len() >= MAX_STATIONS {
                tracing::warn!(
                    "Placement stopped at {} gemstones, {:.5} before the end; size or gap too small",
                    MAX_STATIONS,
                    self.end - current
                );
                break;
            }
            stations.push((current, size));
            if self.is_inside(current) {
                last_inside = Some(size);
            }

            let radius = size / 2.0;
            let current_point = (self.point)(current);
            let mut next = current + size + self.gap;

            for _ in 0..SPACING_REFINEMENT_ITERATIONS {
                let next_radius = self.size_at(next, lead, last_inside) / 2.0;
                let target = radius + next_radius + self.gap;
                let actual = current_point.distance((self.point)(next));
                if (actual - target).abs() < SIZE_EPSILON {
                    break;
                }
                let scale = if actual > SIZE_EPSILON { target / actual } else { 1.0 };
                next = current + (next - current) * scale;
            }

            if next <= current + SIZE_EPSILON {
                tracing::warn!("Placement walk stalled at {:.5}", current);
                break;
            }
            current = next;
        }
        stations
    }

    /// Space centres exactly `(end - start) / (n - 1)` apart, keeping sizes
    fn redistribute(&self, stations: &mut [(f64, f64)]) {
        match stations.len() {
            0 => {}
            1 => stations[0].0 = (self.start + self.end) / 2.0,
            n => {
                let spacing = (self.end - self.start) / (n - 1) as f64;
                for (i, station) in stations.iter_mut().enumerate() {
                    station.0 = self.start + spacing * i as f64;
                }
            }
        }
    }
}
