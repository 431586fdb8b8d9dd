//! Key-value attributes attached to bodies and sketches
//!
//! The host keeps attributes per owner under a group name. Gemstone metadata
//! lives in one consolidated `properties` JSON attribute; older documents
//! carry one attribute per field, which are still read.

use std::collections::HashMap;

use gk_core::constants::ATTRIBUTE_GROUP;
use gk_core::gemstone::{EntityKind, attributes};
use gk_core::{GemstoneRecord, JewelryResult, LegacyGemstoneAttributes, SchemaWarning};
use parking_lot::RwLock;
use uuid::Uuid;

/// Host attribute storage scoped to a body or sketch
pub trait AttributeStore: Send + Sync {
    fn get(&self, owner: Uuid, group: &str, name: &str) -> Option<String>;

    /// Store a value, returning the one it replaced
    fn set(&self, owner: Uuid, group: &str, name: &str, value: String) -> Option<String>;

    /// Delete a value, returning it
    fn remove(&self, owner: Uuid, group: &str, name: &str) -> Option<String>;

    /// Drop every attribute of `owner`
    fn clear_owner(&self, owner: Uuid);
}

type AttributeKey = (Uuid, String, String);

/// Attribute store held in memory
#[derive(Debug, Default)]
pub struct MemoryAttributeStore {
    values: RwLock<HashMap<AttributeKey, String>>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored attributes
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn get(&self, owner: Uuid, group: &str, name: &str) -> Option<String> {
        self.values
            .read()
            .get(&(owner, group.to_string(), name.to_string()))
            .cloned()
    }

    fn set(&self, owner: Uuid, group: &str, name: &str, value: String) -> Option<String> {
        self.values
            .write()
            .insert((owner, group.to_string(), name.to_string()), value)
    }

    fn remove(&self, owner: Uuid, group: &str, name: &str) -> Option<String> {
        self.values
            .write()
            .remove(&(owner, group.to_string(), name.to_string()))
    }

    fn clear_owner(&self, owner: Uuid) {
        self.values.write().retain(|(id, _, _), _| *id != owner);
    }
}

// ============== Toolkit attributes ==============

fn toolkit_attribute(store: &dyn AttributeStore, owner: Uuid, name: &str) -> Option<String> {
    store.get(owner, ATTRIBUTE_GROUP, name)
}

/// Per-field attributes from documents predating the consolidated blob
pub fn legacy_gemstone_attributes(store: &dyn AttributeStore, owner: Uuid) -> LegacyGemstoneAttributes {
    LegacyGemstoneAttributes {
        entity: toolkit_attribute(store, owner, attributes::ENTITY),
        cut: toolkit_attribute(store, owner, attributes::GEMSTONE_CUT),
        is_flipped: toolkit_attribute(store, owner, attributes::GEMSTONE_IS_FLIPPED),
        absolute_depth_offset: toolkit_attribute(store, owner, attributes::GEMSTONE_ABSOLUTE_DEPTH_OFFSET),
        relative_depth_offset: toolkit_attribute(store, owner, attributes::GEMSTONE_RELATIVE_DEPTH_OFFSET),
    }
}

/// Entity tag of a body, if it carries one
pub fn read_entity_kind(store: &dyn AttributeStore, owner: Uuid) -> Option<EntityKind> {
    EntityKind::read(
        toolkit_attribute(store, owner, attributes::PROPERTIES).as_deref(),
        toolkit_attribute(store, owner, attributes::ENTITY).as_deref(),
    )
}

/// Gemstone metadata of a body; `None` when the body is not tagged as a gemstone
pub fn read_gemstone_record(
    store: &dyn AttributeStore,
    owner: Uuid,
) -> JewelryResult<Option<(GemstoneRecord, Vec<SchemaWarning>)>> {
    let properties = toolkit_attribute(store, owner, attributes::PROPERTIES);
    let legacy = legacy_gemstone_attributes(store, owner);
    GemstoneRecord::read(properties.as_deref(), &legacy)
}

/// Write gemstone metadata in the consolidated form.
///
/// Returns the previous `properties` value.
pub fn write_gemstone_record(
    store: &dyn AttributeStore,
    owner: Uuid,
    record: &GemstoneRecord,
) -> JewelryResult<Option<String>> {
    Ok(store.set(owner, ATTRIBUTE_GROUP, attributes::PROPERTIES, record.to_json()?))
}

/// Tag a prong, channel or cutter body
pub fn write_entity_kind(store: &dyn AttributeStore, owner: Uuid, kind: EntityKind) -> Option<String> {
    store.set(owner, ATTRIBUTE_GROUP, attributes::PROPERTIES, kind.properties_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_previous_value() {
        let store = MemoryAttributeStore::new();
        let owner = Uuid::new_v4();
        assert_eq!(store.set(owner, "g", "a", "1".into()), None);
        assert_eq!(store.set(owner, "g", "a", "2".into()), Some("1".into()));
        assert_eq!(store.get(owner, "g", "a").as_deref(), Some("2"));
        assert_eq!(store.remove(owner, "g", "a").as_deref(), Some("2"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_owner_keeps_others() {
        let store = MemoryAttributeStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.set(a, "g", "x", "1".into());
        store.set(b, "g", "x", "1".into());
        store.clear_owner(a);
        assert_eq!(store.len(), 1);
        assert!(store.get(b, "g", "x").is_some());
    }

    #[test]
    fn test_gemstone_record_round_trip() {
        let store = MemoryAttributeStore::new();
        let owner = Uuid::new_v4();
        let record = GemstoneRecord::new(0.12).with_flip(true);
        write_gemstone_record(&store, owner, &record).unwrap();

        let (read, warnings) = read_gemstone_record(&store, owner).unwrap().unwrap();
        assert_eq!(read, record);
        assert!(warnings.is_empty());
        assert_eq!(read_entity_kind(&store, owner), Some(EntityKind::Gemstone));
    }

    #[test]
    fn test_legacy_attributes_are_read() {
        let store = MemoryAttributeStore::new();
        let owner = Uuid::new_v4();
        store.set(owner, ATTRIBUTE_GROUP, attributes::ENTITY, "gemstone".into());
        store.set(owner, ATTRIBUTE_GROUP, attributes::GEMSTONE_IS_FLIPPED, "true".into());
        store.set(owner, ATTRIBUTE_GROUP, attributes::GEMSTONE_ABSOLUTE_DEPTH_OFFSET, "0.02".into());

        let (record, warnings) = read_gemstone_record(&store, owner).unwrap().unwrap();
        assert!(record.flip_face_normal);
        assert_eq!(record.absolute_depth_offset, 0.02);
        // schemaVersion, cut and relativeDepthOffset fall back to defaults
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_prong_tag_is_not_gemstone() {
        let store = MemoryAttributeStore::new();
        let owner = Uuid::new_v4();
        write_entity_kind(&store, owner, EntityKind::Prong);
        assert_eq!(read_entity_kind(&store, owner), Some(EntityKind::Prong));
        assert!(read_gemstone_record(&store, owner).unwrap().is_none());
    }
}
