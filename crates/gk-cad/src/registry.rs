//! Selectable entities known to the document
//!
//! Features reference their inputs by id. Points, curves, faces and
//! construction planes are resolved here; bodies live in the kernel and
//! sketches in the history.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec3;
use gk_core::{Circle, Curve3D, JewelryError, Plane, SelectionEntity, Surface};
use uuid::Uuid;

use crate::feature::{FeatureError, FeatureResult};

/// An input a feature can depend on
#[derive(Debug, Clone)]
pub enum Entity {
    Selection(SelectionEntity),
    Face(Arc<dyn Surface>),
    ConstructionPlane(Plane),
}

impl Entity {
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::Selection(selection) => selection.type_name(),
            Entity::Face(_) => "Face",
            Entity::ConstructionPlane(_) => "ConstructionPlane",
        }
    }
}

impl From<SelectionEntity> for Entity {
    fn from(selection: SelectionEntity) -> Self {
        Entity::Selection(selection)
    }
}

impl From<Plane> for Entity {
    fn from(plane: Plane) -> Self {
        Entity::ConstructionPlane(plane)
    }
}

fn wrong_type(id: Uuid, entity: &Entity, expected: &str) -> FeatureError {
    FeatureError::Jewelry(JewelryError::InsufficientSelection(format!(
        "entity {} is a {}, expected {}",
        id,
        entity.type_name(),
        expected
    )))
}

/// Entities by id
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<Uuid, Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity under a fresh id
    pub fn add(&mut self, entity: impl Into<Entity>) -> Uuid {
        let id = Uuid::new_v4();
        self.entities.insert(id, entity.into());
        id
    }

    pub fn add_face(&mut self, surface: impl Surface + 'static) -> Uuid {
        self.add(Entity::Face(Arc::new(surface)))
    }

    /// Register an entity under a known id, replacing any previous one
    pub fn insert(&mut self, id: Uuid, entity: impl Into<Entity>) {
        self.entities.insert(id, entity.into());
    }

    pub fn get(&self, id: Uuid) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn entity(&self, id: Uuid) -> FeatureResult<&Entity> {
        self.get(id).ok_or(FeatureError::EntityNotFound(id))
    }

    // ============== Typed lookups ==============

    pub fn point(&self, id: Uuid) -> FeatureResult<DVec3> {
        let entity = self.entity(id)?;
        let point = match entity {
            Entity::Selection(selection) => selection.to_point3d(),
            _ => None,
        };
        point.ok_or_else(|| wrong_type(id, entity, "a point"))
    }

    pub fn curve(&self, id: Uuid) -> FeatureResult<Box<dyn Curve3D>> {
        match self.entity(id)? {
            Entity::Selection(selection) => Ok(selection.to_curve3d()?),
            other => Err(wrong_type(id, other, "a curve")),
        }
    }

    pub fn circle(&self, id: Uuid) -> FeatureResult<Circle> {
        let entity = self.entity(id)?;
        let circle = match entity {
            Entity::Selection(selection) => selection.to_circle(),
            _ => None,
        };
        circle.ok_or_else(|| wrong_type(id, entity, "a circle"))
    }

    pub fn face(&self, id: Uuid) -> FeatureResult<Arc<dyn Surface>> {
        match self.entity(id)? {
            Entity::Face(surface) => Ok(Arc::clone(surface)),
            other => Err(wrong_type(id, other, "a face")),
        }
    }

    pub fn construction_plane(&self, id: Uuid) -> FeatureResult<Plane> {
        match self.entity(id)? {
            Entity::ConstructionPlane(plane) => Ok(*plane),
            other => Err(wrong_type(id, other, "a construction plane")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use gk_core::PlaneSurface;

    #[test]
    fn test_typed_lookups() {
        let mut registry = EntityRegistry::new();
        let point = registry.add(SelectionEntity::Vertex { position: DVec3::X });
        let line = registry.add(SelectionEntity::SketchLine {
            start: DVec3::ZERO,
            end: DVec3::new(2.0, 0.0, 0.0),
        });
        let face = registry.add_face(PlaneSurface::new(Plane::XY, DVec2::ZERO, DVec2::ONE));

        assert_eq!(registry.point(point).unwrap(), DVec3::X);
        assert!((registry.curve(line).unwrap().length() - 2.0).abs() < 1e-12);
        assert!(registry.face(face).is_ok());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_wrong_type_is_insufficient_selection() {
        let mut registry = EntityRegistry::new();
        let line = registry.add(SelectionEntity::SketchLine {
            start: DVec3::ZERO,
            end: DVec3::X,
        });
        assert!(matches!(
            registry.point(line),
            Err(FeatureError::Jewelry(JewelryError::InsufficientSelection(_)))
        ));
        assert!(matches!(
            registry.face(Uuid::new_v4()),
            Err(FeatureError::EntityNotFound(_))
        ));
    }
}
