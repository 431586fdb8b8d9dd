//! Base-feature edit scope
//!
//! Body and attribute changes made on behalf of a custom feature happen
//! inside one [`BaseFeature`]. Only one can be open per document; dropping it
//! without [`BaseFeature::finish`] undoes every recorded change.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gk_core::constants::ATTRIBUTE_GROUP;
use uuid::Uuid;

use crate::attributes::AttributeStore;
use crate::feature::{FeatureError, FeatureResult};
use crate::kernel::{BodyGeometry, CadKernel, Solid};

enum Undo {
    Created(Solid),
    Replaced(Solid, BodyGeometry),
    Removed(Solid, BodyGeometry),
    Attribute {
        owner: Uuid,
        name: String,
        previous: Option<String>,
    },
}

/// An open base-feature edit
pub struct BaseFeature {
    kernel: Arc<dyn CadKernel>,
    store: Arc<dyn AttributeStore>,
    open: Arc<AtomicBool>,
    undo: Vec<Undo>,
    removals: Vec<Solid>,
    finished: bool,
}

impl BaseFeature {
    /// Open the edit scope, failing if another one is still open
    pub fn begin(
        kernel: Arc<dyn CadKernel>,
        store: Arc<dyn AttributeStore>,
        open: Arc<AtomicBool>,
    ) -> FeatureResult<Self> {
        if open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FeatureError::TransactionActive);
        }
        Ok(Self {
            kernel,
            store,
            open,
            undo: Vec::new(),
            removals: Vec::new(),
            finished: false,
        })
    }

    pub fn add_body(&mut self, geometry: &BodyGeometry) -> FeatureResult<Solid> {
        let solid = self.kernel.create_body(geometry)?;
        self.undo.push(Undo::Created(solid));
        Ok(solid)
    }

    pub fn update_body(&mut self, solid: &Solid, geometry: &BodyGeometry) -> FeatureResult<()> {
        let previous = self.kernel.geometry(solid)?;
        self.kernel.update_body(solid, geometry)?;
        self.undo.push(Undo::Replaced(*solid, previous));
        Ok(())
    }

    /// Schedule a body for deletion when the edit finishes
    pub fn remove_body(&mut self, solid: &Solid) {
        self.removals.push(*solid);
    }

    pub fn set_attribute(&mut self, owner: Uuid, name: &str, value: String) {
        let previous = self.store.set(owner, ATTRIBUTE_GROUP, name, value);
        self.undo.push(Undo::Attribute {
            owner,
            name: name.to_string(),
            previous,
        });
    }

    /// Commit the edit and apply scheduled deletions.
    ///
    /// If a deletion fails the whole edit is rolled back, including the
    /// bodies already deleted.
    pub fn finish(mut self) -> FeatureResult<()> {
        let removals = std::mem::take(&mut self.removals);
        for solid in &removals {
            let geometry = self.kernel.geometry(solid)?;
            self.kernel.remove_body(solid)?;
            self.undo.push(Undo::Removed(*solid, geometry));
        }
        for solid in &removals {
            self.store.clear_owner(solid.id);
        }
        self.finished = true;
        Ok(())
    }

    fn rollback(&mut self) {
        while let Some(step) = self.undo.pop() {
            let result = match step {
                Undo::Created(solid) => {
                    self.store.clear_owner(solid.id);
                    self.kernel.remove_body(&solid)
                }
                Undo::Replaced(solid, geometry) => self.kernel.update_body(&solid, &geometry),
                Undo::Removed(solid, geometry) => self.kernel.restore_body(&solid, &geometry),
                Undo::Attribute { owner, name, previous } => {
                    match previous {
                        Some(value) => self.store.set(owner, ATTRIBUTE_GROUP, &name, value),
                        None => self.store.remove(owner, ATTRIBUTE_GROUP, &name),
                    };
                    Ok(())
                }
            };
            if let Err(e) = result {
                tracing::error!("Rollback step failed: {}", e);
            }
        }
    }
}

impl Drop for BaseFeature {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Base feature edit aborted, rolling back {} changes", self.undo.len());
            self.rollback();
        }
        self.open.store(false, Ordering::Release);
    }
}
