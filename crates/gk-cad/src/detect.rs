//! Recognizing gemstone bodies
//!
//! A body is a gemstone when its metadata says so. Bodies without metadata
//! (imported, or from documents that predate tagging) are recognized by
//! their faces: exactly one planar face (the table) and exactly one
//! cylindrical face (the girdle).

use gk_core::gemstone::EntityKind;
use gk_core::{GemstoneInfo, SchemaWarning};

use crate::attributes::{AttributeStore, read_entity_kind, read_gemstone_record};
use crate::feature::FeatureResult;
use crate::kernel::{CadError, CadKernel, FaceGeometry, FaceInfo, Solid};

fn has_gemstone_faces(faces: &[FaceInfo]) -> bool {
    faces.iter().filter(|f| f.geometry.is_plane()).count() == 1
        && faces.iter().filter(|f| f.geometry.is_cylinder()).count() == 1
}

/// Whether `solid` is a gemstone, by metadata first and geometry second
pub fn is_gemstone(kernel: &dyn CadKernel, store: &dyn AttributeStore, solid: &Solid) -> FeatureResult<bool> {
    match read_entity_kind(store, solid.id) {
        Some(kind) => Ok(kind == EntityKind::Gemstone),
        None => Ok(has_gemstone_faces(&kernel.faces(solid)?)),
    }
}

/// Girdle, table and seating data of a gemstone body.
///
/// The girdle centroid and radius come from the cylindrical face, the crown
/// direction from the table plane; flip and depth settings from metadata.
pub fn gemstone_info(
    kernel: &dyn CadKernel,
    store: &dyn AttributeStore,
    solid: &Solid,
) -> FeatureResult<(GemstoneInfo, Vec<SchemaWarning>)> {
    let faces = kernel.faces(solid)?;
    let not_a_gemstone = || CadError::InvalidGeometry(format!("body {} has no table and girdle", solid.id));

    let normal = faces
        .iter()
        .find_map(|f| match f.geometry {
            FaceGeometry::Plane { normal, .. } => Some(normal),
            _ => None,
        })
        .ok_or_else(not_a_gemstone)?;
    let (centroid, radius, height) = faces
        .iter()
        .find_map(|f| match f.geometry {
            FaceGeometry::Cylinder { radius, height, .. } => Some((f.centroid, radius, height)),
            _ => None,
        })
        .ok_or_else(not_a_gemstone)?;

    let mut info = GemstoneInfo::new(centroid, normal, radius).with_girdle_thickness(height);
    let mut warnings = Vec::new();
    if let Some((record, missing)) = read_gemstone_record(store, solid.id)? {
        info = info.with_record(&record);
        warnings = missing;
    }
    Ok((info, warnings))
}

/// Every gemstone body in the document, in creation order
pub fn find_gemstones(kernel: &dyn CadKernel, store: &dyn AttributeStore) -> Vec<(Solid, GemstoneInfo)> {
    kernel
        .solids()
        .into_iter()
        .filter(|solid| is_gemstone(kernel, store, solid).unwrap_or(false))
        .filter_map(|solid| match gemstone_info(kernel, store, &solid) {
            Ok((info, _)) => Some((solid, info)),
            Err(e) => {
                tracing::debug!("Skipping body {}: {}", solid.id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{MemoryAttributeStore, write_entity_kind, write_gemstone_record};
    use crate::kernel::{BodyGeometry, MemoryKernel};
    use approx::assert_relative_eq;
    use glam::{DAffine3, DQuat, DVec3};
    use gk_core::{GemstoneCut, GemstoneRecord, Primitive, Shape};

    fn gemstone_body(kernel: &MemoryKernel, size: f64, at: DVec3) -> Solid {
        let placement = DAffine3::from_scale_rotation_translation(DVec3::splat(size), DQuat::IDENTITY, at);
        kernel
            .create_body(&BodyGeometry::Gemstone {
                cut: GemstoneCut::Round,
                placement,
            })
            .unwrap()
    }

    #[test]
    fn test_untagged_gemstone_detected_by_faces() {
        let kernel = MemoryKernel::new();
        let store = MemoryAttributeStore::new();
        let solid = gemstone_body(&kernel, 0.1, DVec3::ZERO);
        assert!(is_gemstone(&kernel, &store, &solid).unwrap());
    }

    #[test]
    fn test_box_like_solid_is_not_gemstone() {
        let kernel = MemoryKernel::new();
        let store = MemoryAttributeStore::new();
        let shape = Shape::new(Primitive::cylinder(DVec3::ZERO, DVec3::Z, 1.0));
        let solid = kernel.create_body(&BodyGeometry::Shape(shape)).unwrap();
        assert!(!is_gemstone(&kernel, &store, &solid).unwrap());
    }

    #[test]
    fn test_metadata_wins_over_geometry() {
        let kernel = MemoryKernel::new();
        let store = MemoryAttributeStore::new();
        let solid = gemstone_body(&kernel, 0.1, DVec3::ZERO);
        write_entity_kind(&store, solid.id, EntityKind::Cutter);
        assert!(!is_gemstone(&kernel, &store, &solid).unwrap());
    }

    #[test]
    fn test_info_reads_girdle_and_record() {
        let kernel = MemoryKernel::new();
        let store = MemoryAttributeStore::new();
        let solid = gemstone_body(&kernel, 0.2, DVec3::new(1.0, 2.0, 3.0));
        write_gemstone_record(&store, solid.id, &GemstoneRecord::new(0.2).with_depth_offsets(0.01, 0.0)).unwrap();

        let (info, warnings) = gemstone_info(&kernel, &store, &solid).unwrap();
        assert!(warnings.is_empty());
        assert_relative_eq!(info.radius, 0.1, epsilon = 1e-12);
        assert_relative_eq!(info.girdle_thickness, 0.006, epsilon = 1e-12);
        assert_relative_eq!(info.centroid.z, 3.0, epsilon = 1e-12);
        assert_relative_eq!(info.table_normal.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(info.absolute_depth_offset, 0.01);
    }

    #[test]
    fn test_find_gemstones_skips_other_bodies() {
        let kernel = MemoryKernel::new();
        let store = MemoryAttributeStore::new();
        let first = gemstone_body(&kernel, 0.1, DVec3::ZERO);
        let shape = Shape::new(Primitive::sphere(DVec3::ZERO, 1.0));
        kernel.create_body(&BodyGeometry::Shape(shape)).unwrap();
        let second = gemstone_body(&kernel, 0.2, DVec3::X);

        let found: Vec<Solid> = find_gemstones(&kernel, &store).into_iter().map(|(s, _)| s).collect();
        assert_eq!(found, vec![first, second]);
    }
}
