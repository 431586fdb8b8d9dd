//! Job files
//!
//! A job describes a design for the headless runner: named host entities,
//! pre-existing bodies, and the feature steps to run against them. Jobs are
//! stored as RON.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use gk_cad::feature::indexed;
use gk_cad::{
    BodyGeometry, CustomFeature, FeatureError, FeatureHistory, FeatureKind, FeatureState,
    find_gemstones,
};
use gk_core::gemstone::EntityKind;
use gk_core::{
    CylinderSurface, Frame3D, GemstoneCut, GemstoneSummary, JewelryError, Plane, PlaneSurface,
    SchemaWarning, SelectionEntity, TriangleMesh,
};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Job-related errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("Unknown reference '{0}'")]
    UnknownReference(String),

    #[error("Reference '{0}' resolves to {1} ids, expected one")]
    AmbiguousReference(String, usize),

    #[error("Duplicate name '{0}'")]
    DuplicateName(String),

    #[error("Step {index} ({name}) failed: {source}")]
    Step {
        index: usize,
        name: String,
        source: FeatureError,
    },

    #[error(transparent)]
    Jewelry(#[from] JewelryError),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

pub type JobResult<T> = Result<T, JobError>;

// ============== File format ==============

/// A selectable host entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEntity {
    Point(DVec3),
    Vertex(DVec3),
    Line { start: DVec3, end: DVec3 },
    Arc { start: DVec3, mid: DVec3, end: DVec3 },
    Circle { center: DVec3, normal: DVec3, radius: f64 },
    Spline(Vec<DVec3>),
    Edge(Vec<DVec3>),
    /// Rectangular planar face, bounds in plane coordinates
    PlaneFace {
        origin: DVec3,
        x_dir: DVec3,
        y_dir: DVec3,
        min: DVec2,
        max: DVec2,
    },
    /// Cylindrical face; angles in radians from `ref_dir`
    CylinderFace {
        base: DVec3,
        axis: DVec3,
        ref_dir: DVec3,
        radius: f64,
        angles: (f64, f64),
        heights: (f64, f64),
    },
    ConstructionPlane { origin: DVec3, x_dir: DVec3, y_dir: DVec3 },
}

/// A body present before the first step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobBody {
    /// Untagged round gemstone, e.g. from an older document
    Gemstone { center: DVec3, normal: DVec3, size: f64 },
    Mesh {
        vertices: Vec<DVec3>,
        triangles: Vec<[usize; 3]>,
    },
}

/// One id, or an ordered list expanded to `name0..nameN`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStep {
    Create {
        name: String,
        kind: FeatureKind,
        #[serde(default)]
        params: Value,
        #[serde(default)]
        dependencies: BTreeMap<String, Reference>,
    },
    Edit {
        feature: String,
        #[serde(default)]
        params: Value,
    },
    Delete { feature: String },
    Rebuild,
}

impl JobStep {
    fn label(&self) -> String {
        match self {
            JobStep::Create { name, .. } => format!("create {}", name),
            JobStep::Edit { feature, .. } => format!("edit {}", feature),
            JobStep::Delete { feature } => format!("delete {}", feature),
            JobStep::Rebuild => "rebuild".to_string(),
        }
    }
}

/// A design to run headlessly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub entities: BTreeMap<String, JobEntity>,
    #[serde(default)]
    pub bodies: BTreeMap<String, JobBody>,
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

impl Job {
    /// Three stones on a flat face with cutters under them
    pub fn sample() -> Self {
        let stone = |x: f64| JobEntity::Point(DVec3::new(x, 0.0, 0.0));
        Self {
            name: "Sample".to_string(),
            entities: BTreeMap::from([
                (
                    "floor".to_string(),
                    JobEntity::PlaneFace {
                        origin: DVec3::ZERO,
                        x_dir: DVec3::X,
                        y_dir: DVec3::Y,
                        min: DVec2::splat(-5.0),
                        max: DVec2::splat(5.0),
                    },
                ),
                ("p0".to_string(), stone(0.0)),
                ("p1".to_string(), stone(0.16)),
                ("p2".to_string(), stone(0.32)),
            ]),
            bodies: BTreeMap::new(),
            steps: vec![
                JobStep::Create {
                    name: "Stones".to_string(),
                    kind: FeatureKind::GemstonesAtPoints,
                    params: serde_json::json!({ "size": 0.15 }),
                    dependencies: BTreeMap::from([
                        ("face".to_string(), Reference::One("floor".to_string())),
                        (
                            "point".to_string(),
                            Reference::Many(vec!["p0".to_string(), "p1".to_string(), "p2".to_string()]),
                        ),
                    ]),
                },
                JobStep::Create {
                    name: "Prongs".to_string(),
                    kind: FeatureKind::ProngsBetweenGemstones,
                    params: Value::Null,
                    dependencies: BTreeMap::from([(
                        "firstGemstoneFace".to_string(),
                        Reference::Many(vec!["@Stones".to_string()]),
                    )]),
                },
                JobStep::Create {
                    name: "Cutters".to_string(),
                    kind: FeatureKind::CuttersForGemstones,
                    params: Value::Null,
                    dependencies: BTreeMap::from([(
                        "firstGemstoneFace".to_string(),
                        Reference::Many(vec!["@Stones".to_string()]),
                    )]),
                },
            ],
        }
    }

    /// Save job to a file
    pub fn save(&self, path: impl AsRef<Path>) -> JobResult<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| JobError::Serialize(e.to_string()))?;
        std::fs::write(path.as_ref(), content).map_err(|e| JobError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load job from a file
    pub fn load(path: impl AsRef<Path>) -> JobResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| JobError::Io(e.to_string()))?;
        Self::from_ron(&content)
    }

    pub fn from_ron(content: &str) -> JobResult<Self> {
        ron::from_str(content).map_err(|e| JobError::Deserialize(e.to_string()))
    }

    /// Execute every step against a fresh in-memory document
    pub fn run(&self) -> JobResult<Session> {
        let mut session = Session::new();
        for (name, entity) in &self.entities {
            session.add_entity(name, entity)?;
        }
        for (name, body) in &self.bodies {
            session.add_body(name, body)?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            tracing::debug!("Step {}: {}", index, step.label());
            session.apply(step).map_err(|e| match e {
                JobError::Feature(source) => JobError::Step {
                    index,
                    name: step.label(),
                    source,
                },
                other => other,
            })?;
        }
        Ok(session)
    }
}

// ============== Execution ==============

/// A document built from a job
pub struct Session {
    history: FeatureHistory,
    names: HashMap<String, Uuid>,
}

impl Session {
    fn new() -> Self {
        Self {
            history: FeatureHistory::default(),
            names: HashMap::new(),
        }
    }

    fn claim(&mut self, name: &str, id: Uuid) -> JobResult<()> {
        if self.names.insert(name.to_string(), id).is_some() {
            return Err(JobError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn add_entity(&mut self, name: &str, entity: &JobEntity) -> JobResult<()> {
        let registry = self.history.registry_mut();
        let id = match entity {
            JobEntity::Point(position) => registry.add(SelectionEntity::SketchPoint { position: *position }),
            JobEntity::Vertex(position) => registry.add(SelectionEntity::Vertex { position: *position }),
            JobEntity::Line { start, end } => registry.add(SelectionEntity::SketchLine {
                start: *start,
                end: *end,
            }),
            JobEntity::Arc { start, mid, end } => registry.add(SelectionEntity::SketchArc {
                start: *start,
                mid: *mid,
                end: *end,
            }),
            JobEntity::Circle { center, normal, radius } => registry.add(SelectionEntity::SketchCircle {
                center: *center,
                normal: *normal,
                radius: *radius,
            }),
            JobEntity::Spline(points) => registry.add(SelectionEntity::SketchSpline { points: points.clone() }),
            JobEntity::Edge(points) => registry.add(SelectionEntity::ModelEdge { points: points.clone() }),
            JobEntity::PlaneFace { origin, x_dir, y_dir, min, max } => {
                let plane = Plane::new(*origin, *x_dir, *y_dir)?;
                registry.add_face(PlaneSurface::new(plane, *min, *max))
            }
            JobEntity::CylinderFace { base, axis, ref_dir, radius, angles, heights } => registry.add_face(
                CylinderSurface::new(*base, *axis, *ref_dir, *radius, *angles, *heights),
            ),
            JobEntity::ConstructionPlane { origin, x_dir, y_dir } => {
                registry.add(Plane::new(*origin, *x_dir, *y_dir)?)
            }
        };
        self.claim(name, id)
    }

    fn add_body(&mut self, name: &str, body: &JobBody) -> JobResult<()> {
        let geometry = match body {
            JobBody::Gemstone { center, normal, size } => {
                let frame = Frame3D::from_normal_and_tangent(*center, *normal, normal.any_orthonormal_vector());
                BodyGeometry::Gemstone {
                    cut: GemstoneCut::Round,
                    placement: frame.scaled_affine(*size),
                }
            }
            JobBody::Mesh { vertices, triangles } => {
                BodyGeometry::Mesh(TriangleMesh::new(vertices.clone(), triangles.clone()))
            }
        };
        let solid = self
            .history
            .kernel()
            .create_body(&geometry)
            .map_err(FeatureError::from)?;
        self.claim(name, solid.id)
    }

    fn feature_named(&self, name: &str) -> JobResult<&CustomFeature> {
        self.names
            .get(name)
            .and_then(|&id| self.history.get(id))
            .ok_or_else(|| JobError::UnknownReference(name.to_string()))
    }

    /// Ids behind a name: `@Feature` is the feature's sketch, or else its bodies
    fn resolve(&self, reference: &str) -> JobResult<Vec<Uuid>> {
        if let Some(feature) = reference.strip_prefix('@') {
            let feature = self.feature_named(feature)?;
            return Ok(match feature.sketch {
                Some(sketch) => vec![sketch],
                None => feature.bodies.clone(),
            });
        }
        self.names
            .get(reference)
            .map(|&id| vec![id])
            .ok_or_else(|| JobError::UnknownReference(reference.to_string()))
    }

    fn dependencies(&self, references: &BTreeMap<String, Reference>) -> JobResult<BTreeMap<String, Uuid>> {
        let mut dependencies = BTreeMap::new();
        for (key, reference) in references {
            match reference {
                Reference::One(name) => {
                    let ids = self.resolve(name)?;
                    let [id] = ids.as_slice() else {
                        return Err(JobError::AmbiguousReference(name.clone(), ids.len()));
                    };
                    dependencies.insert(key.clone(), *id);
                }
                Reference::Many(names) => {
                    let mut ids = Vec::new();
                    for name in names {
                        ids.extend(self.resolve(name)?);
                    }
                    dependencies.extend(indexed(key, ids));
                }
            }
        }
        Ok(dependencies)
    }

    fn apply(&mut self, step: &JobStep) -> JobResult<()> {
        match step {
            JobStep::Create { name, kind, params, dependencies } => {
                let dependencies = self.dependencies(dependencies)?;
                let id = self.history.create_feature(*kind, name.as_str(), params.clone(), dependencies)?;
                self.claim(name, id)?;
            }
            JobStep::Edit { feature, params } => {
                let id = self.feature_named(feature)?.id;
                self.history.edit_feature(id, params.clone())?;
            }
            JobStep::Delete { feature } => {
                let id = self.feature_named(feature)?.id;
                self.history.delete_feature(id)?;
                self.names.remove(feature);
            }
            JobStep::Rebuild => {
                let failed = self.history.rebuild();
                if !failed.is_empty() {
                    tracing::warn!("{} features failed to rebuild", failed.len());
                }
            }
        }
        Ok(())
    }

    // ============== Reports ==============

    pub fn report(&self, job: &str) -> Report {
        let history = &self.history;
        let features = history
            .features()
            .iter()
            .map(|feature| {
                let sketch = feature.sketch.and_then(|id| history.sketch(id));
                FeatureReport {
                    name: feature.name.clone(),
                    kind: feature.kind,
                    state: feature.state(),
                    parameters: feature.parameters.clone(),
                    bodies: feature.bodies.iter().map(|&id| self.body_report(id)).collect(),
                    sketch_lines: sketch.map(|sketch| sketch.lines.len()),
                    sketch_size: sketch.and_then(|sketch| sketch.bounding_box()).map(|bb| bb.size()),
                    warnings: feature.warnings.clone(),
                }
            })
            .collect();
        Report {
            job: job.to_string(),
            features,
            gemstones: self.gemstones(),
        }
    }

    fn body_report(&self, id: Uuid) -> BodyReport {
        let solid = gk_cad::Solid::new(id);
        let kernel = self.history.kernel();
        let (geometry, size) = match kernel.geometry(&solid) {
            Ok(geometry) => (
                geometry.type_name(),
                kernel.bounding_box(&solid).ok().map(|bb| bb.size()),
            ),
            Err(_) => ("Missing", None),
        };
        BodyReport {
            id,
            geometry,
            entity: gk_cad::attributes::read_entity_kind(self.history.store(), id),
            size,
        }
    }

    pub fn gemstones(&self) -> Vec<GemstoneSummary> {
        find_gemstones(self.history.kernel(), self.history.store())
            .iter()
            .map(|(_, info)| GemstoneSummary::from(info))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BodyReport {
    pub id: Uuid,
    pub geometry: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
    /// Bounding box extents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<DVec3>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureReport {
    pub name: String,
    pub kind: FeatureKind,
    pub state: FeatureState,
    pub parameters: Value,
    pub bodies: Vec<BodyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch_lines: Option<usize>,
    /// Extents of the unfolded pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch_size: Option<DVec3>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SchemaWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub job: String,
    pub features: Vec<FeatureReport>,
    pub gemstones: Vec<GemstoneSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RING: &str = r#"
Job(
    name: "Ring",
    entities: {
        "floor": PlaneFace(
            origin: (0.0, 0.0, 0.0),
            x_dir: (1.0, 0.0, 0.0),
            y_dir: (0.0, 1.0, 0.0),
            min: (-5.0, -5.0),
            max: (5.0, 5.0),
        ),
        "p0": Point((0.0, 0.0, 0.0)),
        "p1": Point((0.16, 0.0, 0.0)),
        "p2": Point((0.32, 0.0, 0.0)),
    },
    steps: [
        Create(
            name: "Stones",
            kind: GemstonesAtPoints,
            params: { "size": 0.15 },
            dependencies: { "face": "floor", "point": ["p0", "p1", "p2"] },
        ),
        Create(
            name: "Cutters",
            kind: CuttersForGemstones,
            dependencies: { "firstGemstoneFace": ["@Stones"] },
        ),
        Edit(feature: "Stones", params: { "size": 0.12 }),
    ],
)
"#;

    #[test]
    fn test_run_ring_job() {
        let job = Job::from_ron(RING).unwrap();
        let session = job.run().unwrap();
        let report = session.report(&job.name);

        assert_eq!(report.features.len(), 2);
        assert_eq!(report.features[0].bodies.len(), 3);
        assert_eq!(report.features[0].parameters["size"], serde_json::json!(0.12));
        assert!(report.features[1]
            .bodies
            .iter()
            .all(|body| body.entity == Some(EntityKind::Cutter)));
        assert_eq!(report.gemstones.len(), 3);
        assert_eq!(report.gemstones[0].label, "1.20");
    }

    #[test]
    fn test_job_file_round_trip() {
        let job = Job::sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ring.ron");

        job.save(&path).unwrap();
        let loaded = Job::load(&path).unwrap();

        assert_eq!(loaded, job);
    }

    #[test]
    fn test_sample_runs() {
        let session = Job::sample().run().unwrap();
        let report = session.report("Sample");
        assert_eq!(report.features.len(), 3);
        assert!(!report.features[1].bodies.is_empty());
        assert_eq!(report.features[2].bodies.len(), 3);
    }

    #[test]
    fn test_unknown_reference() {
        let job = Job {
            name: "Broken".into(),
            steps: vec![JobStep::Create {
                name: "Stones".into(),
                kind: FeatureKind::GemstonesAtPoints,
                params: Value::Null,
                dependencies: BTreeMap::from([("face".to_string(), Reference::One("missing".into()))]),
            }],
            ..Default::default()
        };
        assert!(matches!(job.run(), Err(JobError::UnknownReference(name)) if name == "missing"));
    }

    #[test]
    fn test_failed_step_is_reported() {
        let job = Job {
            name: "Tiny".into(),
            entities: BTreeMap::from([
                (
                    "floor".to_string(),
                    JobEntity::PlaneFace {
                        origin: DVec3::ZERO,
                        x_dir: DVec3::X,
                        y_dir: DVec3::Y,
                        min: DVec2::splat(-1.0),
                        max: DVec2::splat(1.0),
                    },
                ),
                ("p0".to_string(), JobEntity::Point(DVec3::ZERO)),
            ]),
            steps: vec![JobStep::Create {
                name: "Stones".into(),
                kind: FeatureKind::GemstonesAtPoints,
                params: serde_json::json!({ "size": 0.01 }),
                dependencies: BTreeMap::from([
                    ("face".to_string(), Reference::One("floor".into())),
                    ("point".to_string(), Reference::Many(vec!["p0".into()])),
                ]),
            }],
            ..Default::default()
        };
        assert!(matches!(job.run(), Err(JobError::Step { index: 0, .. })));
    }

    #[test]
    fn test_unfold_report_has_pattern_size() {
        let job = Job {
            name: "Pattern".into(),
            entities: BTreeMap::from([
                (
                    "band".to_string(),
                    JobEntity::PlaneFace {
                        origin: DVec3::ZERO,
                        x_dir: DVec3::X,
                        y_dir: DVec3::Y,
                        min: DVec2::ZERO,
                        max: DVec2::new(2.0, 1.0),
                    },
                ),
                ("o".to_string(), JobEntity::Vertex(DVec3::ZERO)),
                ("x".to_string(), JobEntity::Vertex(DVec3::X)),
                ("y".to_string(), JobEntity::Vertex(DVec3::Y)),
            ]),
            steps: vec![JobStep::Create {
                name: "Unfold".into(),
                kind: FeatureKind::SurfaceUnfold,
                params: serde_json::json!({ "accuracy": 0.25, "algorithm": 1 }),
                dependencies: BTreeMap::from([
                    ("source".to_string(), Reference::One("band".into())),
                    ("origin".to_string(), Reference::One("o".into())),
                    ("xDirection".to_string(), Reference::One("x".into())),
                    ("yDirection".to_string(), Reference::One("y".into())),
                ]),
            }],
            ..Default::default()
        };

        let report = job.run().unwrap().report(&job.name);

        let unfold = &report.features[0];
        assert!(unfold.sketch_lines.unwrap() > 0);
        assert_eq!(unfold.parameters["algorithm"], serde_json::json!("Nurbs"));
        let size = unfold.sketch_size.unwrap();
        assert!((size.x - 2.0).abs() < 1e-3);
        assert!((size.y - 1.0).abs() < 1e-3);
    }
}
