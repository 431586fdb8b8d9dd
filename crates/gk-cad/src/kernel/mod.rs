//! Solid modeler abstraction

mod memory;
mod traits;

use std::sync::Arc;

pub use memory::MemoryKernel;
pub use traits::{
    BodyGeometry, CadError, CadKernel, CadResult, FaceGeometry, FaceId, FaceInfo, Solid,
};

/// Kernel used when the caller does not inject one
pub fn default_kernel() -> Arc<dyn CadKernel> {
    Arc::new(MemoryKernel::new())
}
