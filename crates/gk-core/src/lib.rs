//! Jewelry Modeling Core
//!
//! This crate provides:
//! - Geometry sampling of points, curves, faces and meshes into one representation
//! - Gemstone placement along a curve, between two curves, at points and at circles
//! - A proximity graph between placed gemstones, used for prongs and channels
//! - Cutter synthesis for gemstone seats
//! - Surface unfold/refold mapping for pattern making
//!
//! Lengths are in centimetres, the internal unit of the host modeler.

mod choice;
pub mod constants;
pub mod cutter;
pub mod error;
pub mod gemstone;
pub mod geometry;
pub mod placement;
pub mod primitive;
pub mod proximity;
pub mod shape;
pub mod unfold;

// Re-exports for convenience
pub use cutter::{CutterBottomType, CutterParams, cutter_shape};
pub use error::{JewelryError, JewelryResult, SchemaWarning};
pub use gemstone::{
    GemstoneCut, GemstoneInfo, GemstoneRecord, GemstoneSummary, LegacyGemstoneAttributes,
};
pub use geometry::{
    BoundingBox, Circle, CircularArc, Curve3D, CylinderSurface, Frame3D, Plane, PlaneSurface,
    Polyline3D, SelectionEntity, Surface, TriangleMesh,
};
pub use placement::{
    BetweenCurvesParams, CurvePlacementParams, NonlinearProfile, Placement, SeatOptions, Station,
    place_along_curve, place_at_circles, place_at_points, place_between_curves,
};
pub use proximity::{
    ChannelParams, ChannelSegment, ProngAtPointParams, ProngInfo, ProngParams, ProximityEdge,
    build_pairs, channels_between, prongs_between,
};
pub use shape::{Csg, Primitive, Shape};
pub use unfold::{
    UnfoldAlgorithm, UnfoldAnchors, UnfoldMapping, UnfoldOptions, UnfoldOutput, UnfoldSource,
    refold_mesh, refold_point, refold_transform, unfold,
};
