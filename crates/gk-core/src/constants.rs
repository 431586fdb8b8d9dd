//! Global constants for gk-core

use std::ops::RangeInclusive;

/// Smallest diameter the automatic sizing path will produce
pub const MINIMUM_GEMSTONE_SIZE: f64 = 0.05;

/// First and last gemstones closer than this are merged (closed curves)
pub const GEMSTONE_OVERLAP_MERGE_THRESHOLD: f64 = 0.01;

/// Tolerance for constant-size detection and interval end checks
pub const SIZE_EPSILON: f64 = 1e-5;

/// Floor applied to interpolated sizes before quantization
pub const MINIMUM_INTERPOLATED_SIZE: f64 = 0.001;

/// Chord refinement passes when stepping to the next gemstone
pub const SPACING_REFINEMENT_ITERATIONS: usize = 3;

/// Upper bound on gemstones produced by a single walk
pub const MAX_STATIONS: usize = 100_000;

/// Resolution of the averaged polyline between two curves
pub const BETWEEN_CURVES_SAMPLE_STEP: f64 = 0.05;

/// Allowed range of the normalized nonlinear peak position
pub const NONLINEAR_POSITION_RANGE: RangeInclusive<f64> = 0.01..=0.99;

/// Minimum sampling step for surface unfold
pub const UNFOLD_MIN_STEP: f64 = 0.05;

/// Sampling step used when no accuracy is given
pub const UNFOLD_DEFAULT_STEP: f64 = 0.1;

/// Default unfold accuracy
pub const UNFOLD_DEFAULT_ACCURACY: f64 = 0.5;

/// Minimum grid steps per parametric direction
pub const UNFOLD_GRID_MIN: usize = 3;

/// Maximum grid steps per parametric direction
pub const UNFOLD_GRID_MAX: usize = 200;

/// Edge-length relaxation passes after the BFS unfold
pub const RELAXATION_ITERATIONS: usize = 100;

/// Correction factor applied per relaxation pass
pub const RELAXATION_STIFFNESS: f64 = 0.3;

/// Minimum height of the seed triangle
pub const MIN_TRIANGLE_HEIGHT: f64 = 0.01;

/// Barycentric tolerance of the point-in-triangle test
pub const BARYCENTRIC_MARGIN: f64 = 0.01;

/// Attribute namespace shared by every persisted value
pub const ATTRIBUTE_GROUP: &str = "ViveritsaFusionJewelryToolkit";

/// Default number of segments for frustum mesh generation
pub const FRUSTUM_SEGMENTS: u32 = 32;

/// Default number of latitude segments for sphere mesh generation
pub const SPHERE_LAT_SEGMENTS: u32 = 16;

/// Default number of longitude segments for sphere mesh generation
pub const SPHERE_LON_SEGMENTS: u32 = 32;
