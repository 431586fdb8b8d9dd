//! Parametric History
//!
//! Keeps the ordered custom features of a document, supporting rollback,
//! rebuild, and editing of historical features. Every body change a feature
//! makes goes through a [`BaseFeature`] edit so a failed compute leaves the
//! document as it was.

mod transaction;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gk_core::gemstone::attributes;
use gk_core::unfold::UNFOLD_MAPPING_ATTRIBUTE;
use serde_json::Value;
use uuid::Uuid;

pub use transaction::BaseFeature;

use crate::attributes::{AttributeStore, MemoryAttributeStore};
use crate::feature::{
    ComputeContext, ComputeOutput, CustomFeature, FeatureError, FeatureKind, FeatureResult,
    FeatureState, compute,
};
use crate::kernel::{CadKernel, Solid, default_kernel};
use crate::registry::EntityRegistry;
use crate::sketch::Sketch;

/// Manages the custom feature timeline of one document
pub struct FeatureHistory {
    kernel: Arc<dyn CadKernel>,
    store: Arc<dyn AttributeStore>,
    /// Host entities features may depend on
    registry: EntityRegistry,
    /// Ordered list of features
    features: Vec<CustomFeature>,
    /// Current rollback position (None = at end)
    rollback_position: Option<usize>,
    /// Sketches written by surface unfolds
    sketches: HashMap<Uuid, Sketch>,
    transaction_open: Arc<AtomicBool>,
}

impl Default for FeatureHistory {
    fn default() -> Self {
        Self::new(default_kernel(), Arc::new(MemoryAttributeStore::new()))
    }
}

impl FeatureHistory {
    pub fn new(kernel: Arc<dyn CadKernel>, store: Arc<dyn AttributeStore>) -> Self {
        Self {
            kernel,
            store,
            registry: EntityRegistry::new(),
            features: Vec::new(),
            rollback_position: None,
            sketches: HashMap::new(),
            transaction_open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kernel(&self) -> &dyn CadKernel {
        self.kernel.as_ref()
    }

    pub fn store(&self) -> &dyn AttributeStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// Get the number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Get a feature by ID
    pub fn get(&self, id: Uuid) -> Option<&CustomFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    pub fn features(&self) -> &[CustomFeature] {
        &self.features
    }

    pub fn sketches(&self) -> &HashMap<Uuid, Sketch> {
        &self.sketches
    }

    pub fn sketch(&self, id: Uuid) -> Option<&Sketch> {
        self.sketches.get(&id)
    }

    pub fn is_transaction_open(&self) -> bool {
        self.transaction_open.load(Ordering::Acquire)
    }

    /// Open a base-feature edit on this document
    pub fn begin_transaction(&self) -> FeatureResult<BaseFeature> {
        BaseFeature::begin(
            self.kernel.clone(),
            self.store.clone(),
            self.transaction_open.clone(),
        )
    }

    // ============== Rollback ==============

    /// Move the timeline marker after the given feature
    pub fn rollback_to(&mut self, id: Uuid) -> FeatureResult<()> {
        let index = self.index_of(id).ok_or(FeatureError::FeatureNotFound(id))?;
        self.rollback_position = Some(index + 1);
        Ok(())
    }

    pub fn rollback_to_end(&mut self) {
        self.rollback_position = None;
    }

    pub fn rollback_position(&self) -> Option<usize> {
        self.rollback_position
    }

    /// Get the effective number of features (accounting for rollback)
    pub fn effective_len(&self) -> usize {
        self.rollback_position
            .unwrap_or(self.features.len())
            .min(self.features.len())
    }

    // ============== Lifecycle ==============

    /// Compute a new feature and insert it at the timeline marker
    pub fn create_feature(
        &mut self,
        kind: FeatureKind,
        name: impl Into<String>,
        parameters: Value,
        dependencies: BTreeMap<String, Uuid>,
    ) -> FeatureResult<Uuid> {
        let mut feature = CustomFeature::new(kind, name, parameters, dependencies);
        let position = self.effective_len();
        self.compute_and_apply(&mut feature, false)?;
        feature.transition(FeatureState::Computed)?;

        let id = feature.id;
        tracing::info!("Created {} '{}' with {} bodies", kind, feature.name, feature.bodies.len());
        self.features.insert(position, feature);
        if let Some(marker) = self.rollback_position.as_mut() {
            *marker += 1;
        }
        Ok(id)
    }

    /// Merge `parameters` over the persisted blob and recompute.
    ///
    /// The timeline is rolled to the feature while it recomputes and restored
    /// afterwards, whether or not the edit succeeds. A failed edit keeps the
    /// previous parameters and bodies.
    pub fn edit_feature(&mut self, id: Uuid, parameters: Value) -> FeatureResult<()> {
        let index = self.index_of(id).ok_or(FeatureError::FeatureNotFound(id))?;
        let mut feature = self.features[index].clone();
        feature.transition(FeatureState::Editing)?;
        merge_parameters(&mut feature.parameters, parameters)?;

        let fresh = feature.kind.creates_new_bodies_on_edit();
        if let Err(e) = self.compute_rolled_to(&mut feature, index, fresh) {
            tracing::warn!("Edit of {} failed: {}", feature.name, e);
            return Err(e);
        }
        feature.transition(FeatureState::Computed)?;
        self.features[index] = feature;
        Ok(())
    }

    /// Recompute a feature with its persisted parameters
    pub fn recompute(&mut self, id: Uuid) -> FeatureResult<()> {
        let index = self.index_of(id).ok_or(FeatureError::FeatureNotFound(id))?;
        self.recompute_at(index)
    }

    fn recompute_at(&mut self, index: usize) -> FeatureResult<()> {
        let mut feature = self.features[index].clone();
        self.compute_rolled_to(&mut feature, index, false)?;
        feature.transition(FeatureState::Computed)?;
        self.features[index] = feature;
        Ok(())
    }

    /// Remove a feature together with its bodies and sketch
    pub fn delete_feature(&mut self, id: Uuid) -> FeatureResult<CustomFeature> {
        let index = self.index_of(id).ok_or(FeatureError::FeatureNotFound(id))?;
        let mut txn = self.begin_transaction()?;
        let mut feature = self.features[index].clone();
        feature.transition(FeatureState::Deleted)?;
        for &body in &feature.bodies {
            let solid = Solid::new(body);
            if self.kernel.contains(&solid) {
                txn.remove_body(&solid);
            }
        }
        if let Err(e) = txn.finish() {
            tracing::warn!("Delete of {} failed: {}", feature.name, e);
            return Err(e);
        }

        self.features.remove(index);
        if let Some(sketch) = feature.sketch {
            self.sketches.remove(&sketch);
            self.store.clear_owner(sketch);
        }
        if let Some(marker) = self.rollback_position.as_mut() {
            if index < *marker {
                *marker -= 1;
            }
        }
        tracing::info!("Deleted {} '{}'", feature.kind, feature.name);
        Ok(feature)
    }

    // ============== Rebuild ==============

    /// Recompute every effective feature in order.
    ///
    /// Failures are logged and skipped; the ids of failed features are returned.
    pub fn rebuild(&mut self) -> Vec<Uuid> {
        let mut failed = Vec::new();
        for index in 0..self.effective_len() {
            if let Err(e) = self.recompute_at(index) {
                let feature = &self.features[index];
                tracing::warn!("Feature {} failed: {}", feature.name, e);
                failed.push(feature.id);
            }
        }
        failed
    }

    // ============== Compute ==============

    /// Roll the marker to `index`, compute, and put the marker back
    fn compute_rolled_to(&mut self, feature: &mut CustomFeature, index: usize, fresh: bool) -> FeatureResult<()> {
        let saved = self.rollback_position.replace(index);
        let result = self.compute_and_apply(feature, fresh);
        self.rollback_position = saved;
        result
    }

    /// Compute `feature` against the effective timeline and write the result.
    /// With `fresh`, new bodies are created instead of updating the ones the
    /// feature already owns.
    fn compute_and_apply(&mut self, feature: &mut CustomFeature, fresh: bool) -> FeatureResult<()> {
        let (params, mut warnings) = feature.params()?;
        feature.parameters = params.to_value()?;

        let output = {
            let ctx = ComputeContext {
                kernel: self.kernel.as_ref(),
                store: self.store.as_ref(),
                registry: &self.registry,
                sketches: &self.sketches,
                features: &self.features[..self.effective_len()],
            };
            compute(feature, &params, &ctx)?
        };
        warnings.extend(output.warnings.iter().cloned());
        for warning in &warnings {
            warning.log();
        }
        feature.warnings = warnings;

        let (bodies, sketch) = self.apply(feature, output, fresh)?;
        feature.bodies = bodies;
        if let Some(sketch) = sketch {
            feature.sketch = Some(sketch.id);
            self.sketches.insert(sketch.id, sketch);
        }
        Ok(())
    }

    /// Write a compute result through one base-feature edit.
    ///
    /// Owned bodies are updated by index, extra ones created and surplus ones
    /// deleted. The sketch is returned for the caller to commit once the edit
    /// has finished.
    fn apply(
        &self,
        feature: &CustomFeature,
        output: ComputeOutput,
        fresh: bool,
    ) -> FeatureResult<(Vec<Uuid>, Option<Sketch>)> {
        let existing: &[Uuid] = if fresh { &[] } else { &feature.bodies };
        let mut txn = self.begin_transaction()?;

        let mut bodies = Vec::with_capacity(output.bodies.len());
        for (i, body) in output.bodies.iter().enumerate() {
            let solid = match existing.get(i).map(|&id| Solid::new(id)) {
                Some(solid) if self.kernel.contains(&solid) => {
                    txn.update_body(&solid, &body.geometry)?;
                    solid
                }
                _ => txn.add_body(&body.geometry)?,
            };
            if let Some(properties) = &body.properties {
                txn.set_attribute(solid.id, attributes::PROPERTIES, properties.clone());
            }
            bodies.push(solid.id);
        }
        for &surplus in existing.iter().skip(output.bodies.len()) {
            let solid = Solid::new(surplus);
            if self.kernel.contains(&solid) {
                txn.remove_body(&solid);
            }
        }

        let sketch = match output.sketch {
            Some(out) => {
                let mut sketch = feature
                    .sketch
                    .and_then(|id| self.sketches.get(&id).cloned())
                    .unwrap_or_else(|| Sketch::new(format!("{} Pattern", feature.name), out.plane));
                sketch.plane = out.plane;
                sketch.set_lines(out.lines);
                txn.set_attribute(sketch.id, UNFOLD_MAPPING_ATTRIBUTE, out.mapping.to_json()?);
                Some(sketch)
            }
            None => None,
        };

        txn.finish()?;
        Ok((bodies, sketch))
    }
}

/// Overlay the keys of `update` on `base`
fn merge_parameters(base: &mut Value, update: Value) -> FeatureResult<()> {
    match update {
        Value::Null => Ok(()),
        Value::Object(fields) => {
            if !base.is_object() {
                *base = Value::Object(Default::default());
            }
            if let Some(map) = base.as_object_mut() {
                map.extend(fields);
            }
            Ok(())
        }
        other => Err(FeatureError::InvalidParameters(format!(
            "parameters must be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::read_entity_kind;
    use crate::detect::is_gemstone;
    use crate::feature::indexed;
    use crate::kernel::{BodyGeometry, CadError, CadResult, FaceInfo, MemoryKernel};
    use approx::assert_relative_eq;
    use gk_core::gemstone::EntityKind;
    use gk_core::{GemstoneCut, JewelryError, Plane, PlaneSurface, SelectionEntity};
    use glam::{DAffine3, DQuat, DVec2, DVec3};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::BTreeMap;

    /// Memory kernel that refuses to delete one chosen body
    #[derive(Default)]
    struct LockedBodyKernel {
        inner: MemoryKernel,
        locked: Mutex<Option<Uuid>>,
    }

    impl CadKernel for LockedBodyKernel {
        fn create_body(&self, geometry: &BodyGeometry) -> CadResult<Solid> {
            self.inner.create_body(geometry)
        }

        fn update_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()> {
            self.inner.update_body(solid, geometry)
        }

        fn remove_body(&self, solid: &Solid) -> CadResult<()> {
            if *self.locked.lock() == Some(solid.id) {
                return Err(CadError::OperationFailed(format!("body {} is locked", solid.id)));
            }
            self.inner.remove_body(solid)
        }

        fn restore_body(&self, solid: &Solid, geometry: &BodyGeometry) -> CadResult<()> {
            self.inner.restore_body(solid, geometry)
        }

        fn contains(&self, solid: &Solid) -> bool {
            self.inner.contains(solid)
        }

        fn geometry(&self, solid: &Solid) -> CadResult<BodyGeometry> {
            self.inner.geometry(solid)
        }

        fn solids(&self) -> Vec<Solid> {
            self.inner.solids()
        }

        fn faces(&self, solid: &Solid) -> CadResult<Vec<FaceInfo>> {
            self.inner.faces(solid)
        }
    }

    fn floor(history: &mut FeatureHistory) -> Uuid {
        history
            .registry_mut()
            .add_face(PlaneSurface::new(Plane::XY, DVec2::splat(-10.0), DVec2::splat(10.0)))
    }

    fn gemstones_at(history: &mut FeatureHistory, xs: &[f64]) -> Uuid {
        let face = floor(history);
        let points: Vec<Uuid> = xs
            .iter()
            .map(|&x| {
                history.registry_mut().add(SelectionEntity::SketchPoint {
                    position: DVec3::new(x, 0.0, 0.0),
                })
            })
            .collect();
        let mut dependencies = indexed("point", points);
        dependencies.insert("face".into(), face);
        history
            .create_feature(FeatureKind::GemstonesAtPoints, "Gemstones", json!({ "size": 0.15 }), dependencies)
            .unwrap()
    }

    fn geometries(history: &FeatureHistory, id: Uuid) -> Vec<BodyGeometry> {
        history.get(id).unwrap()
            .bodies
            .iter()
            .map(|&body| history.kernel().geometry(&Solid::new(body)).unwrap())
            .collect()
    }

    #[test]
    fn test_create_tags_gemstones() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0, 1.0]);

        let feature = history.get(id).unwrap();
        assert_eq!(feature.state(), FeatureState::Computed);
        assert_eq!(feature.bodies.len(), 2);
        assert_eq!(feature.parameters["size"], json!(0.15));
        assert_eq!(feature.parameters["flipFaceNormal"], json!(false));
        for &body in &feature.bodies {
            let solid = Solid::new(body);
            assert_eq!(read_entity_kind(history.store(), body), Some(EntityKind::Gemstone));
            assert!(is_gemstone(history.kernel(), history.store(), &solid).unwrap());
        }
    }

    #[test]
    fn test_edit_with_same_parameters_is_idempotent() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0, 1.0]);
        let bodies = history.get(id).unwrap().bodies.clone();
        let before = geometries(&history, id);

        history.edit_feature(id, json!({ "size": 0.15 })).unwrap();

        assert_eq!(history.get(id).unwrap().bodies, bodies);
        assert_eq!(geometries(&history, id), before);
    }

    #[test]
    fn test_edit_updates_bodies_in_place() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0, 1.0]);
        let bodies = history.get(id).unwrap().bodies.clone();

        history.edit_feature(id, json!({ "size": 0.3 })).unwrap();

        let feature = history.get(id).unwrap();
        assert_eq!(feature.bodies, bodies);
        assert_eq!(feature.parameters["size"], json!(0.3));
        let BodyGeometry::Gemstone { placement, .. } = &geometries(&history, id)[0] else {
            panic!("expected a gemstone");
        };
        assert_relative_eq!(placement.matrix3.x_axis.length(), 0.3, epsilon = 1e-9);
        assert_eq!(history.kernel().solids().len(), 2);
    }

    #[test]
    fn test_failed_edit_restores_document() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0, 1.0]);
        let before = history.get(id).unwrap().clone();
        let geometry = geometries(&history, id);

        let result = history.edit_feature(id, json!({ "size": 0.01 }));

        assert!(matches!(
            result,
            Err(FeatureError::Jewelry(JewelryError::SizeBelowMinimum { .. }))
        ));
        assert_eq!(history.get(id).unwrap(), &before);
        assert_eq!(geometries(&history, id), geometry);
        assert_eq!(history.rollback_position(), None);
        assert!(!history.is_transaction_open());
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0]);

        let txn = history.begin_transaction().unwrap();
        assert!(matches!(
            history.begin_transaction(),
            Err(FeatureError::TransactionActive)
        ));
        drop(txn);
        assert!(history.edit_feature(id, Value::Null).is_ok());
    }

    #[test]
    fn test_cutter_edit_creates_new_bodies() {
        let mut history = FeatureHistory::default();
        let gems = gemstones_at(&mut history, &[0.0, 1.0]);
        let dependencies = indexed("firstGemstoneFace", history.get(gems).unwrap().bodies.clone());
        let cutters = history
            .create_feature(FeatureKind::CuttersForGemstones, "Cutters", Value::Null, dependencies)
            .unwrap();
        let old = history.get(cutters).unwrap().bodies.clone();

        history.edit_feature(cutters, json!({ "height": 0.5 })).unwrap();

        let new = &history.get(cutters).unwrap().bodies;
        assert_eq!(new.len(), 2);
        assert!(new.iter().all(|id| !old.contains(id)));
        assert!(old.iter().all(|&id| history.kernel().contains(&Solid::new(id))));
        assert_eq!(history.kernel().solids().len(), 6);
    }

    #[test]
    fn test_prongs_and_channels_between_gemstones() {
        let mut history = FeatureHistory::default();
        let gems = gemstones_at(&mut history, &[0.0, 0.16, 0.32]);
        let bodies = history.get(gems).unwrap().bodies.clone();

        let prongs = history
            .create_feature(
                FeatureKind::ProngsBetweenGemstones,
                "Prongs",
                Value::Null,
                indexed("firstGemstoneFace", bodies.clone()),
            )
            .unwrap();
        let channels = history
            .create_feature(
                FeatureKind::ChannelsBetweenGemstones,
                "Channels",
                Value::Null,
                indexed("firstGemstoneFace", bodies),
            )
            .unwrap();

        let prongs = &history.get(prongs).unwrap().bodies;
        assert!(!prongs.is_empty());
        assert!(prongs
            .iter()
            .all(|&id| read_entity_kind(history.store(), id) == Some(EntityKind::Prong)));
        let channels = &history.get(channels).unwrap().bodies;
        assert_eq!(channels.len(), 1);
        assert_eq!(read_entity_kind(history.store(), channels[0]), Some(EntityKind::Channel));
    }

    #[test]
    fn test_unfold_then_refold() {
        let mut history = FeatureHistory::default();
        let registry = history.registry_mut();
        let face = registry.add_face(PlaneSurface::new(Plane::XY, DVec2::ZERO, DVec2::new(2.0, 1.0)));
        let sketch_plane = registry.add(Plane::new(DVec3::new(0.0, 0.0, 5.0), DVec3::X, DVec3::Y).unwrap());
        let origin = registry.add(SelectionEntity::Vertex { position: DVec3::ZERO });
        let x = registry.add(SelectionEntity::Vertex { position: DVec3::X });
        let y = registry.add(SelectionEntity::Vertex { position: DVec3::Y });
        let unfold = history
            .create_feature(
                FeatureKind::SurfaceUnfold,
                "Unfold",
                json!({ "accuracy": 0.25 }),
                BTreeMap::from([
                    ("source".to_string(), face),
                    ("origin".to_string(), origin),
                    ("xDirection".to_string(), x),
                    ("yDirection".to_string(), y),
                    ("constructionPlane".to_string(), sketch_plane),
                ]),
            )
            .unwrap();
        let sketch = history.get(unfold).unwrap().sketch.unwrap();
        assert!(!history.sketch(sketch).unwrap().is_empty());

        let placement = DAffine3::from_scale_rotation_translation(
            DVec3::splat(0.1),
            DQuat::IDENTITY,
            DVec3::new(0.5, 0.5, 5.0),
        );
        let body = history
            .kernel()
            .create_body(&BodyGeometry::Gemstone { cut: GemstoneCut::Round, placement })
            .unwrap();
        let mut dependencies = indexed("firstBodyFace", [body.id]);
        dependencies.insert("sketch".into(), sketch);
        let refold = history
            .create_feature(FeatureKind::ObjectsRefold, "Refold", Value::Null, dependencies)
            .unwrap();

        let copies = geometries(&history, refold);
        assert_eq!(copies.len(), 1);
        assert!(history.kernel().contains(&body));
        let BodyGeometry::Gemstone { placement, .. } = &copies[0] else {
            panic!("expected a gemstone");
        };
        assert_relative_eq!(placement.translation.x, 0.5, epsilon = 1e-3);
        assert_relative_eq!(placement.translation.y, 0.5, epsilon = 1e-3);
        assert_relative_eq!(placement.translation.z, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rebuild_continues_past_failures() {
        let mut history = FeatureHistory::default();
        let first = gemstones_at(&mut history, &[0.0]);
        let second = gemstones_at(&mut history, &[2.0]);
        let face = history.get(first).unwrap().dependency("face").unwrap();
        history.registry_mut().remove(face);

        let failed = history.rebuild();

        assert_eq!(failed, vec![first]);
        assert_eq!(history.get(second).unwrap().state(), FeatureState::Computed);
        assert!(!history.is_transaction_open());
    }

    #[test]
    fn test_create_inserts_at_marker() {
        let mut history = FeatureHistory::default();
        let first = gemstones_at(&mut history, &[0.0]);
        let last = gemstones_at(&mut history, &[2.0]);
        history.rollback_to(first).unwrap();

        let middle = gemstones_at(&mut history, &[4.0]);

        assert_eq!(history.index_of(middle), Some(1));
        assert_eq!(history.index_of(last), Some(2));
        assert_eq!(history.effective_len(), 2);
    }

    #[test]
    fn test_delete_removes_bodies() {
        let mut history = FeatureHistory::default();
        let id = gemstones_at(&mut history, &[0.0, 1.0]);

        let deleted = history.delete_feature(id).unwrap();

        assert_eq!(deleted.state(), FeatureState::Deleted);
        assert!(history.is_empty());
        assert!(history.kernel().solids().is_empty());
        assert!(matches!(
            history.edit_feature(id, Value::Null),
            Err(FeatureError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_failed_delete_keeps_feature() {
        let kernel = Arc::new(LockedBodyKernel::default());
        let mut history = FeatureHistory::new(kernel.clone(), Arc::new(MemoryAttributeStore::new()));
        let id = gemstones_at(&mut history, &[0.0, 1.0, 2.0]);
        let before = history.get(id).unwrap().clone();
        let geometry = geometries(&history, id);
        *kernel.locked.lock() = Some(before.bodies[1]);

        let result = history.delete_feature(id);

        assert!(matches!(result, Err(FeatureError::CadError(CadError::OperationFailed(_)))));
        assert_eq!(history.get(id).unwrap(), &before);
        assert_eq!(history.get(id).unwrap().state(), FeatureState::Computed);
        assert_eq!(geometries(&history, id), geometry);
        for &body in &before.bodies {
            assert!(is_gemstone(history.kernel(), history.store(), &Solid::new(body)).unwrap());
        }
        assert!(!history.is_transaction_open());

        *kernel.locked.lock() = None;
        history.delete_feature(id).unwrap();
        assert!(history.kernel().solids().is_empty());
    }

    #[test]
    fn test_compute_only_sees_features_before_marker() {
        let mut history = FeatureHistory::default();
        let first = gemstones_at(&mut history, &[0.0]);
        let registry = history.registry_mut();
        let face = registry.add_face(PlaneSurface::new(Plane::XY, DVec2::ZERO, DVec2::new(2.0, 1.0)));
        let origin = registry.add(SelectionEntity::Vertex { position: DVec3::ZERO });
        let x = registry.add(SelectionEntity::Vertex { position: DVec3::X });
        let y = registry.add(SelectionEntity::Vertex { position: DVec3::Y });
        let unfold = history
            .create_feature(
                FeatureKind::SurfaceUnfold,
                "Unfold",
                json!({ "accuracy": 0.25 }),
                BTreeMap::from([
                    ("source".to_string(), face),
                    ("origin".to_string(), origin),
                    ("xDirection".to_string(), x),
                    ("yDirection".to_string(), y),
                ]),
            )
            .unwrap();
        let sketch = history.get(unfold).unwrap().sketch.unwrap();
        let placement = DAffine3::from_scale_rotation_translation(
            DVec3::splat(0.1),
            DQuat::IDENTITY,
            DVec3::new(0.5, 0.5, 0.0),
        );
        let body = history
            .kernel()
            .create_body(&BodyGeometry::Gemstone { cut: GemstoneCut::Round, placement })
            .unwrap();
        let mut dependencies = indexed("firstBodyFace", [body.id]);
        dependencies.insert("sketch".into(), sketch);

        history.rollback_to(first).unwrap();
        let early = history.create_feature(FeatureKind::ObjectsRefold, "Refold", Value::Null, dependencies.clone());
        assert!(matches!(
            early,
            Err(FeatureError::Jewelry(JewelryError::InsufficientSelection(_)))
        ));
        assert_eq!(history.rollback_position(), Some(1));

        history.rollback_to_end();
        let refold = history
            .create_feature(FeatureKind::ObjectsRefold, "Refold", Value::Null, dependencies)
            .unwrap();
        history.recompute(refold).unwrap();
        assert_eq!(history.rollback_position(), None);
        assert_eq!(history.index_of(refold), Some(2));
    }
}
