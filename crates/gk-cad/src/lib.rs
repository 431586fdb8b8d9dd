//! Host Modeler Abstraction and Custom Features
//!
//! This crate provides:
//! - Abstract modeler traits for bodies, faces and tessellation
//! - Attribute storage for gemstone and part metadata
//! - Gemstone recognition from metadata or face topology
//! - The ten parametric jewelry features and their compute strategies
//! - A feature history with transactional base-feature edits

pub mod attributes;
pub mod detect;
pub mod feature;
pub mod history;
pub mod kernel;
pub mod registry;
pub mod sketch;

// Re-exports for convenience
pub use attributes::{AttributeStore, MemoryAttributeStore};
pub use detect::{find_gemstones, gemstone_info, is_gemstone};
pub use feature::{CustomFeature, FeatureError, FeatureKind, FeatureParams, FeatureResult, FeatureState};
pub use history::{BaseFeature, FeatureHistory};
pub use kernel::{
    BodyGeometry, CadError, CadKernel, CadResult, FaceGeometry, FaceId, FaceInfo, MemoryKernel,
    Solid, default_kernel,
};
pub use registry::{Entity, EntityRegistry};
pub use sketch::{Sketch, SketchLine};
