//! Per-kind compute strategies
//!
//! Computing never touches the document: it reads the current inputs and
//! returns the bodies and sketch the feature should own. The history applies
//! the result inside a base-feature transaction.

use std::collections::HashMap;
use std::sync::Arc;

use gk_core::constants::ATTRIBUTE_GROUP;
use gk_core::gemstone::{EntityKind, attributes};
use gk_core::placement::{Placement, seat_stations};
use gk_core::proximity::{channel_shape, prong_at_point};
use gk_core::unfold::{LEGACY_SOURCE_DATA_ATTRIBUTE, UNFOLD_MAPPING_ATTRIBUTE};
use gk_core::{
    ChannelParams, CutterParams, GemstoneCut, GemstoneInfo, GemstoneRecord, JewelryError, Plane,
    ProngAtPointParams, ProngParams, SchemaWarning, SeatOptions, Station, Surface, TriangleMesh,
    UnfoldAnchors, UnfoldMapping, UnfoldSource, channels_between, cutter_shape, place_along_curve,
    place_at_circles, place_at_points, place_between_curves, prongs_between, refold_mesh,
    refold_transform, unfold,
};
use glam::DVec3;
use serde_json::Value;
use uuid::Uuid;

use super::{CustomFeature, FeatureError, FeatureKind, FeatureParams, FeatureResult, SeatParams};
use crate::attributes::AttributeStore;
use crate::detect::{gemstone_info, is_gemstone};
use crate::kernel::{BodyGeometry, CadKernel, Solid};
use crate::registry::EntityRegistry;
use crate::sketch::Sketch;

/// Read access to the document while a feature computes
pub struct ComputeContext<'a> {
    pub kernel: &'a dyn CadKernel,
    pub store: &'a dyn AttributeStore,
    pub registry: &'a EntityRegistry,
    pub sketches: &'a HashMap<Uuid, Sketch>,
    /// Features before the one being computed, in timeline order
    pub features: &'a [CustomFeature],
}

/// A body to create or update
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBody {
    pub geometry: BodyGeometry,
    /// Consolidated `properties` attribute to write, if any
    pub properties: Option<String>,
}

/// Unfolded pattern and the mapping attached to its sketch
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSketch {
    pub plane: Plane,
    pub lines: Vec<(DVec3, DVec3)>,
    pub mapping: UnfoldMapping,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputeOutput {
    pub bodies: Vec<OutputBody>,
    pub sketch: Option<OutputSketch>,
    /// Metadata fields recovered with defaults while reading inputs
    pub warnings: Vec<SchemaWarning>,
}

impl ComputeOutput {
    fn bodies(bodies: Vec<OutputBody>) -> Self {
        Self {
            bodies,
            ..Default::default()
        }
    }
}

/// Run the strategy of `feature.kind` with `params`
pub fn compute(
    feature: &CustomFeature,
    params: &FeatureParams,
    ctx: &ComputeContext<'_>,
) -> FeatureResult<ComputeOutput> {
    if params.kind() != feature.kind {
        return Err(FeatureError::InvalidParameters(format!(
            "{} parameters given to a {} feature",
            params.kind(),
            feature.kind
        )));
    }

    let output = match params {
        FeatureParams::GemstonesAtPoints(p) => {
            let surface = ctx.registry.face(feature.dependency("face")?)?;
            let points = points(feature, ctx)?;
            let stations = place_at_points(&points, p.size)?;
            gemstones_on_face(feature, surface.as_ref(), &stations, &p.seat)?
        }
        FeatureParams::GemstonesAtCircles(p) => {
            let surface = ctx.registry.face(feature.dependency("face")?)?;
            let circles = feature
                .indexed_dependencies("circle")
                .into_iter()
                .map(|id| ctx.registry.circle(id))
                .collect::<FeatureResult<Vec<_>>>()?;
            let stations = place_at_circles(&circles)?;
            gemstones_on_face(feature, surface.as_ref(), &stations, &p.seat)?
        }
        FeatureParams::GemstonesAtCurve(p) => {
            let surface = ctx.registry.face(feature.dependency("face")?)?;
            let curve = ctx.registry.curve(feature.dependency("curve")?)?;
            let stations = place_along_curve(curve.as_ref(), &p.placement())?;
            gemstones_on_face(feature, surface.as_ref(), &stations, &p.seat)?
        }
        FeatureParams::GemstonesBetweenCurves(p) => {
            let surface = ctx.registry.face(feature.dependency("face")?)?;
            let curve_a = ctx.registry.curve(feature.dependency("curveA")?)?;
            let curve_b = ctx.registry.curve(feature.dependency("curveB")?)?;
            let stations = place_between_curves(curve_a.as_ref(), curve_b.as_ref(), &p.placement())?;
            gemstones_on_face(feature, surface.as_ref(), &stations, &p.seat)?
        }
        FeatureParams::ProngsAtPoints(p) => {
            let surface = ctx.registry.face(feature.dependency("face")?)?;
            let points = points(feature, ctx)?;
            if points.is_empty() {
                return Err(JewelryError::InsufficientSelection("select at least one point".into()).into());
            }
            let prong_params = ProngAtPointParams::from(*p);
            let bodies = points
                .iter()
                .map(|&point| {
                    let prong = prong_at_point(surface.as_ref(), point, &prong_params)?;
                    Ok(tagged(BodyGeometry::Shape(prong.shape(p.flat)), EntityKind::Prong))
                })
                .collect::<FeatureResult<Vec<_>>>()?;
            ComputeOutput::bodies(bodies)
        }
        FeatureParams::ProngsBetweenGemstones(p) => {
            let (gemstones, warnings) = gemstones(feature, ctx)?;
            let prongs = prongs_between(&gemstones, &ProngParams::from(*p))?;
            let bodies = prongs
                .iter()
                .map(|prong| tagged(BodyGeometry::Shape(prong.shape(true)), EntityKind::Prong))
                .collect();
            ComputeOutput {
                warnings,
                ..ComputeOutput::bodies(bodies)
            }
        }
        FeatureParams::ChannelsBetweenGemstones(p) => {
            let (gemstones, warnings) = gemstones(feature, ctx)?;
            let segments = channels_between(&gemstones, &ChannelParams::from(*p))?;
            let bodies = if segments.is_empty() {
                Vec::new()
            } else {
                vec![tagged(BodyGeometry::Shape(channel_shape(&segments)), EntityKind::Channel)]
            };
            ComputeOutput {
                warnings,
                ..ComputeOutput::bodies(bodies)
            }
        }
        FeatureParams::CuttersForGemstones(p) => {
            let (gemstones, warnings) = gemstones(feature, ctx)?;
            if gemstones.is_empty() {
                return Err(JewelryError::InsufficientSelection("select at least one gemstone".into()).into());
            }
            let cutter = CutterParams::from(*p);
            let bodies = gemstones
                .iter()
                .map(|gemstone| {
                    let shape = cutter_shape(gemstone, &cutter)?;
                    Ok(tagged(BodyGeometry::Shape(shape), EntityKind::Cutter))
                })
                .collect::<FeatureResult<Vec<_>>>()?;
            ComputeOutput {
                warnings,
                ..ComputeOutput::bodies(bodies)
            }
        }
        FeatureParams::SurfaceUnfold(p) => {
            let anchors = unfold_anchors(feature, ctx)?;
            let plane = unfold_plane(feature, ctx)?;
            let options = p.options(plane);
            let source = unfold_source(feature, ctx)?;
            let result = match &source {
                SourceGeometry::Face(surface) => {
                    unfold(&UnfoldSource::Surface(surface.as_ref()), &anchors, &options)?
                }
                SourceGeometry::Mesh(mesh) => unfold(&UnfoldSource::Mesh(mesh), &anchors, &options)?,
            };
            ComputeOutput {
                sketch: Some(OutputSketch {
                    plane,
                    lines: result.sketch_lines(),
                    mapping: result.mapping,
                }),
                ..Default::default()
            }
        }
        FeatureParams::ObjectsRefold(_) => refold(feature, ctx)?,
    };

    tracing::debug!("{} computed {} bodies", feature.name, output.bodies.len());
    Ok(output)
}

// ============== Inputs ==============

fn points(feature: &CustomFeature, ctx: &ComputeContext<'_>) -> FeatureResult<Vec<DVec3>> {
    feature
        .indexed_dependencies("point")
        .into_iter()
        .map(|id| ctx.registry.point(id))
        .collect()
}

/// Gemstones referenced by `firstGemstoneFace{i}`; unreadable bodies are skipped
fn gemstones(
    feature: &CustomFeature,
    ctx: &ComputeContext<'_>,
) -> FeatureResult<(Vec<GemstoneInfo>, Vec<SchemaWarning>)> {
    let mut gemstones = Vec::new();
    let mut warnings = Vec::new();
    for id in feature.indexed_dependencies("firstGemstoneFace") {
        let solid = Solid::new(id);
        if !ctx.kernel.contains(&solid) {
            tracing::warn!("Gemstone body {} no longer exists, skipping", id);
            continue;
        }
        match is_gemstone(ctx.kernel, ctx.store, &solid) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Body {} is not a gemstone, skipping", id);
                continue;
            }
            Err(e) => {
                tracing::warn!("Could not inspect body {}: {}", id, e);
                continue;
            }
        }
        match gemstone_info(ctx.kernel, ctx.store, &solid) {
            Ok((info, missing)) => {
                gemstones.push(info);
                warnings.extend(missing);
            }
            Err(e) => tracing::warn!("Could not read gemstone {}: {}", id, e),
        }
    }
    Ok((gemstones, warnings))
}

// ============== Gemstones ==============

fn gemstone_body(placement: &Placement, seat: &SeatParams, parameters: &Value) -> FeatureResult<OutputBody> {
    let record = GemstoneRecord::new(placement.size)
        .with_flip(seat.flip_face_normal)
        .with_depth_offsets(seat.absolute_depth_offset, seat.relative_depth_offset)
        .with_creation_parameters(parameters.clone());
    Ok(OutputBody {
        geometry: BodyGeometry::Gemstone {
            cut: record.cut,
            placement: placement.gemstone_transform(),
        },
        properties: Some(record.to_json()?),
    })
}

fn gemstones_on_face(
    feature: &CustomFeature,
    surface: &dyn Surface,
    stations: &[Station],
    seat: &SeatParams,
) -> FeatureResult<ComputeOutput> {
    let options = SeatOptions::from(*seat);
    let placements = seat_stations(surface, stations, GemstoneCut::Round, &options);
    let bodies = placements
        .iter()
        .map(|placement| gemstone_body(placement, seat, &feature.parameters))
        .collect::<FeatureResult<Vec<_>>>()?;
    Ok(ComputeOutput::bodies(bodies))
}

fn tagged(geometry: BodyGeometry, kind: EntityKind) -> OutputBody {
    OutputBody {
        geometry,
        properties: Some(kind.properties_json()),
    }
}

// ============== Unfold ==============

enum SourceGeometry {
    Face(Arc<dyn Surface>),
    Mesh(TriangleMesh),
}

impl SourceGeometry {
    fn surface(&self) -> Option<&dyn Surface> {
        match self {
            SourceGeometry::Face(surface) => Some(surface.as_ref()),
            SourceGeometry::Mesh(_) => None,
        }
    }
}

/// A face entity, or a body unfolded through its tessellation
fn unfold_source(feature: &CustomFeature, ctx: &ComputeContext<'_>) -> FeatureResult<SourceGeometry> {
    let id = feature.dependency("source")?;
    if ctx.registry.contains(id) {
        return Ok(SourceGeometry::Face(ctx.registry.face(id)?));
    }
    let solid = Solid::new(id);
    if ctx.kernel.contains(&solid) {
        return Ok(SourceGeometry::Mesh(ctx.kernel.tessellate(&solid)?));
    }
    Err(FeatureError::EntityNotFound(id))
}

fn unfold_anchors(feature: &CustomFeature, ctx: &ComputeContext<'_>) -> FeatureResult<UnfoldAnchors> {
    Ok(UnfoldAnchors {
        origin: ctx.registry.point(feature.dependency("origin")?)?,
        x_direction: ctx.registry.point(feature.dependency("xDirection")?)?,
        y_direction: ctx.registry.point(feature.dependency("yDirection")?)?,
    })
}

/// The optional construction plane, XY by default
fn unfold_plane(feature: &CustomFeature, ctx: &ComputeContext<'_>) -> FeatureResult<Plane> {
    match feature.dependencies.get("constructionPlane") {
        Some(&id) => ctx.registry.construction_plane(id),
        None => Ok(Plane::XY),
    }
}

// ============== Refold ==============

/// Mapping attached to an unfold sketch, reading the legacy keyed form if needed
fn sketch_mapping(
    sketch: Uuid,
    unfold_feature: &CustomFeature,
    ctx: &ComputeContext<'_>,
) -> FeatureResult<UnfoldMapping> {
    if let Some(json) = ctx.store.get(sketch, ATTRIBUTE_GROUP, UNFOLD_MAPPING_ATTRIBUTE) {
        return Ok(UnfoldMapping::from_json(&json)?);
    }
    if let Some(json) = ctx.store.get(sketch, ATTRIBUTE_GROUP, LEGACY_SOURCE_DATA_ATTRIBUTE) {
        let anchors = unfold_anchors(unfold_feature, ctx)?;
        let plane = unfold_plane(unfold_feature, ctx)?;
        return Ok(UnfoldMapping::from_legacy(&json, anchors, plane)?);
    }
    Err(JewelryError::Schema(format!("sketch {} carries no unfold mapping", sketch)).into())
}

/// Copies of the selected bodies carried from the unfold sketch onto the source.
///
/// Analytic bodies move rigidly, mesh bodies are deformed vertex by vertex.
fn refold(feature: &CustomFeature, ctx: &ComputeContext<'_>) -> FeatureResult<ComputeOutput> {
    let sketch = feature.dependency("sketch")?;
    if !ctx.sketches.contains_key(&sketch) {
        return Err(FeatureError::EntityNotFound(sketch));
    }
    let unfold_feature = ctx
        .features
        .iter()
        .find(|f| f.kind == FeatureKind::SurfaceUnfold && f.sketch == Some(sketch))
        .ok_or_else(|| {
            JewelryError::InsufficientSelection(format!(
                "sketch {} was not created by a surface unfold",
                sketch
            ))
        })?;

    let mapping = sketch_mapping(sketch, unfold_feature, ctx)?;
    let source = unfold_source(unfold_feature, ctx)?;

    let ids = feature.indexed_dependencies("firstBodyFace");
    if ids.is_empty() {
        return Err(JewelryError::InsufficientSelection("select at least one body".into()).into());
    }

    let mut bodies = Vec::with_capacity(ids.len());
    for id in ids {
        let solid = Solid::new(id);
        let geometry = ctx.kernel.geometry(&solid)?;
        let refolded = match &geometry {
            BodyGeometry::Mesh(mesh) => BodyGeometry::Mesh(refold_mesh(&mapping, mesh)?),
            _ => {
                let center = ctx.kernel.bounding_box(&solid)?.center();
                let transform = refold_transform(&mapping, center, source.surface())?;
                geometry.transformed(&transform)
            }
        };
        bodies.push(OutputBody {
            geometry: refolded,
            properties: ctx.store.get(id, ATTRIBUTE_GROUP, attributes::PROPERTIES),
        });
    }
    Ok(ComputeOutput::bodies(bodies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::MemoryAttributeStore;
    use crate::feature::indexed;
    use crate::kernel::MemoryKernel;
    use approx::assert_relative_eq;
    use glam::DVec2;
    use gk_core::{PlaneSurface, SelectionEntity};
    use std::collections::BTreeMap;

    struct Fixture {
        kernel: MemoryKernel,
        store: MemoryAttributeStore,
        registry: EntityRegistry,
        sketches: HashMap<Uuid, Sketch>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                kernel: MemoryKernel::new(),
                store: MemoryAttributeStore::new(),
                registry: EntityRegistry::new(),
                sketches: HashMap::new(),
            }
        }

        fn ctx(&self) -> ComputeContext<'_> {
            ComputeContext {
                kernel: &self.kernel,
                store: &self.store,
                registry: &self.registry,
                sketches: &self.sketches,
                features: &[],
            }
        }

        fn floor(&mut self) -> Uuid {
            self.registry
                .add_face(PlaneSurface::new(Plane::XY, DVec2::splat(-10.0), DVec2::splat(10.0)))
        }
    }

    fn run(kind: FeatureKind, parameters: Value, dependencies: BTreeMap<String, Uuid>, ctx: &ComputeContext<'_>) -> FeatureResult<ComputeOutput> {
        let feature = CustomFeature::new(kind, kind.name(), parameters, dependencies);
        let (params, _) = feature.params()?;
        compute(&feature, &params, ctx)
    }

    #[test]
    fn test_gemstones_at_points_are_tagged() {
        let mut fx = Fixture::new();
        let face = fx.floor();
        let points: Vec<Uuid> = [DVec3::ZERO, DVec3::X]
            .into_iter()
            .map(|position| fx.registry.add(SelectionEntity::SketchPoint { position }))
            .collect();
        let mut dependencies = indexed("point", points);
        dependencies.insert("face".into(), face);

        let output = run(FeatureKind::GemstonesAtPoints, serde_json::json!({ "size": 0.2 }), dependencies, &fx.ctx()).unwrap();
        assert_eq!(output.bodies.len(), 2);
        let properties = output.bodies[0].properties.as_deref().unwrap();
        assert!(properties.contains("\"entity\":\"gemstone\""));
        assert!(properties.contains("\"diameter\":0.2"));
    }

    #[test]
    fn test_size_below_minimum_fails() {
        let mut fx = Fixture::new();
        let face = fx.floor();
        let point = fx.registry.add(SelectionEntity::Vertex { position: DVec3::ZERO });
        let mut dependencies = indexed("point", [point]);
        dependencies.insert("face".into(), face);

        let result = run(FeatureKind::GemstonesAtPoints, serde_json::json!({ "size": 0.01 }), dependencies, &fx.ctx());
        assert!(matches!(
            result,
            Err(FeatureError::Jewelry(JewelryError::SizeBelowMinimum { .. }))
        ));
    }

    #[test]
    fn test_missing_face_dependency() {
        let fx = Fixture::new();
        let result = run(FeatureKind::GemstonesAtCurve, Value::Null, BTreeMap::new(), &fx.ctx());
        assert!(matches!(result, Err(FeatureError::MissingDependency(name)) if name == "face"));
    }

    #[test]
    fn test_cutters_skip_non_gemstones() {
        let fx = Fixture::new();
        let gemstone = fx
            .kernel
            .create_body(&BodyGeometry::Gemstone {
                cut: GemstoneCut::Round,
                placement: glam::DAffine3::from_scale(DVec3::splat(0.1)),
            })
            .unwrap();
        let cylinder = fx
            .kernel
            .create_body(&BodyGeometry::Shape(gk_core::Shape::new(gk_core::Primitive::cylinder(
                DVec3::ZERO,
                DVec3::Z,
                0.1,
            ))))
            .unwrap();
        let dependencies = indexed("firstGemstoneFace", [gemstone.id, cylinder.id]);

        let output = run(FeatureKind::CuttersForGemstones, Value::Null, dependencies, &fx.ctx()).unwrap();
        assert_eq!(output.bodies.len(), 1);
        assert!(output.bodies[0].properties.as_deref().unwrap().contains("cutter"));
    }

    #[test]
    fn test_prongs_need_two_gemstones() {
        let fx = Fixture::new();
        let gemstone = fx
            .kernel
            .create_body(&BodyGeometry::Gemstone {
                cut: GemstoneCut::Round,
                placement: glam::DAffine3::from_scale(DVec3::splat(0.1)),
            })
            .unwrap();
        let dependencies = indexed("firstGemstoneFace", [gemstone.id]);
        let result = run(FeatureKind::ProngsBetweenGemstones, Value::Null, dependencies, &fx.ctx());
        assert!(matches!(
            result,
            Err(FeatureError::Jewelry(JewelryError::InsufficientGemstones { found: 1 }))
        ));
    }

    #[test]
    fn test_unfold_writes_sketch_on_offset_plane() {
        let mut fx = Fixture::new();
        let face = fx
            .registry
            .add_face(PlaneSurface::new(Plane::XY, DVec2::ZERO, DVec2::new(2.0, 1.0)));
        let plane = fx.registry.add(
            Plane::new(DVec3::new(0.0, 0.0, 5.0), DVec3::X, DVec3::Y).unwrap(),
        );
        let origin = fx.registry.add(SelectionEntity::Vertex { position: DVec3::ZERO });
        let x = fx.registry.add(SelectionEntity::Vertex { position: DVec3::X });
        let y = fx.registry.add(SelectionEntity::Vertex { position: DVec3::Y });
        let dependencies = BTreeMap::from([
            ("source".to_string(), face),
            ("origin".to_string(), origin),
            ("xDirection".to_string(), x),
            ("yDirection".to_string(), y),
            ("constructionPlane".to_string(), plane),
        ]);

        let output = run(FeatureKind::SurfaceUnfold, serde_json::json!({ "accuracy": 0.5 }), dependencies, &fx.ctx()).unwrap();
        let sketch = output.sketch.unwrap();
        assert!(output.bodies.is_empty());
        assert!(!sketch.lines.is_empty());
        for (start, end) in &sketch.lines {
            assert_relative_eq!(start.z, 5.0, epsilon = 1e-9);
            assert_relative_eq!(end.z, 5.0, epsilon = 1e-9);
        }
    }
}
