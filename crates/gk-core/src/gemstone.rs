//! Gemstone metadata, cut proportions and extracted geometry

use std::fmt;
use std::str::FromStr;

use glam::DVec3;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{JewelryError, JewelryResult, SchemaWarning};

/// Schema version written with every consolidated properties blob
pub const GEMSTONE_SCHEMA_VERSION: Version = Version::new(2, 0, 0);

/// Attribute names inside [`crate::constants::ATTRIBUTE_GROUP`]
pub mod attributes {
    /// Consolidated JSON properties
    pub const PROPERTIES: &str = "properties";
    pub const ENTITY: &str = "entity";
    pub const GEMSTONE_CUT: &str = "gemstoneCut";
    pub const GEMSTONE_IS_FLIPPED: &str = "gemstoneIsFlipped";
    pub const GEMSTONE_ABSOLUTE_DEPTH_OFFSET: &str = "gemstoneAbsoluteDepthOffset";
    pub const GEMSTONE_RELATIVE_DEPTH_OFFSET: &str = "gemstoneRelativeDepthOffset";
}

// ============== Entity kinds ==============

/// What a tagged body is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Gemstone,
    Prong,
    Cutter,
    Channel,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Gemstone => "gemstone",
            EntityKind::Prong => "prong",
            EntityKind::Cutter => "cutter",
            EntityKind::Channel => "channel",
        }
    }

    /// Minimal consolidated blob for non-gemstone bodies
    pub fn properties_json(&self) -> String {
        serde_json::json!({
            "schemaVersion": GEMSTONE_SCHEMA_VERSION.to_string(),
            "entity": self.as_str(),
        })
        .to_string()
    }

    /// Entity tag from the consolidated blob, falling back to the legacy attribute
    pub fn read(properties: Option<&str>, legacy_entity: Option<&str>) -> Option<Self> {
        properties
            .and_then(|json| serde_json::from_str::<serde_json::Value>(json).ok())
            .and_then(|value| {
                value
                    .get(attributes::ENTITY)
                    .and_then(|e| e.as_str())
                    .and_then(|e| e.parse().ok())
            })
            .or_else(|| legacy_entity.and_then(|e| e.parse().ok()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = JewelryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemstone" => Ok(EntityKind::Gemstone),
            "prong" => Ok(EntityKind::Prong),
            "cutter" => Ok(EntityKind::Cutter),
            "channel" => Ok(EntityKind::Channel),
            other => Err(JewelryError::Schema(format!("unknown entity '{}'", other))),
        }
    }
}

// ============== Cut ==============

/// Gemstone cut
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GemstoneCut {
    #[default]
    Round,
}

impl GemstoneCut {
    pub fn as_str(&self) -> &'static str {
        match self {
            GemstoneCut::Round => "round",
        }
    }

    /// Girdle band height for a unit diameter
    pub fn girdle_thickness(&self) -> f64 {
        match self {
            GemstoneCut::Round => 0.03,
        }
    }

    /// Half-profile `(radius, z)` for a unit diameter, girdle centre at the
    /// origin and table facing +Z. Runs from the table centre to the culet.
    pub fn profile(&self) -> Vec<(f64, f64)> {
        match self {
            GemstoneCut::Round => {
                let table = 0.57;
                let crown = 0.162;
                let pavilion = 0.431;
                let half_girdle = self.girdle_thickness() / 2.0;
                vec![
                    (0.0, half_girdle + crown),
                    (table / 2.0, half_girdle + crown),
                    (0.5, half_girdle),
                    (0.5, -half_girdle),
                    (0.0, -half_girdle - pavilion),
                ]
            }
        }
    }
}

impl FromStr for GemstoneCut {
    type Err = JewelryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round" => Ok(GemstoneCut::Round),
            other => Err(JewelryError::Schema(format!("unknown cut '{}'", other))),
        }
    }
}

// ============== Persisted record ==============

/// Per-field attributes written before the consolidated JSON existed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyGemstoneAttributes {
    pub entity: Option<String>,
    pub cut: Option<String>,
    pub is_flipped: Option<String>,
    pub absolute_depth_offset: Option<String>,
    pub relative_depth_offset: Option<String>,
}

impl LegacyGemstoneAttributes {
    fn flip(&self) -> Option<bool> {
        self.is_flipped
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    fn number(value: &Option<String>) -> Option<f64> {
        value.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

/// Consolidated blob as found on disk; every field may be missing
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StoredGemstone {
    schema_version: Option<String>,
    entity: Option<String>,
    cut: Option<String>,
    diameter: Option<f64>,
    #[serde(alias = "flip")]
    flip_face_normal: Option<bool>,
    absolute_depth_offset: Option<f64>,
    relative_depth_offset: Option<f64>,
    creation_parameters: Option<serde_json::Value>,
}

/// Metadata attached to a gemstone body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GemstoneRecord {
    pub schema_version: String,
    pub entity: EntityKind,
    pub cut: GemstoneCut,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter: Option<f64>,
    pub flip_face_normal: bool,
    pub absolute_depth_offset: f64,
    pub relative_depth_offset: f64,
    #[serde(default)]
    pub creation_parameters: serde_json::Value,
}

impl GemstoneRecord {
    pub fn new(diameter: f64) -> Self {
        Self {
            schema_version: GEMSTONE_SCHEMA_VERSION.to_string(),
            entity: EntityKind::Gemstone,
            cut: GemstoneCut::Round,
            diameter: Some(diameter),
            flip_face_normal: false,
            absolute_depth_offset: 0.0,
            relative_depth_offset: 0.0,
            creation_parameters: serde_json::Value::Null,
        }
    }

    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip_face_normal = flip;
        self
    }

    pub fn with_depth_offsets(mut self, absolute: f64, relative: f64) -> Self {
        self.absolute_depth_offset = absolute;
        self.relative_depth_offset = relative;
        self
    }

    pub fn with_creation_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.creation_parameters = parameters;
        self
    }

    pub fn is_gemstone(&self) -> bool {
        self.entity == EntityKind::Gemstone
    }

    pub fn to_json(&self) -> JewelryResult<String> {
        serde_json::to_string(self).map_err(|e| JewelryError::Schema(e.to_string()))
    }

    /// Merge the consolidated blob with legacy attributes.
    ///
    /// Each field resolves to the JSON value, then the legacy attribute, then
    /// the default; a default yields one [`SchemaWarning`]. Returns `None`
    /// when neither source tags the body as a gemstone.
    pub fn read(
        properties: Option<&str>,
        legacy: &LegacyGemstoneAttributes,
    ) -> JewelryResult<Option<(Self, Vec<SchemaWarning>)>> {
        let stored: StoredGemstone = match properties {
            Some(json) => {
                serde_json::from_str(json).map_err(|e| JewelryError::Schema(e.to_string()))?
            }
            None => StoredGemstone::default(),
        };

        let entity = stored
            .entity
            .as_deref()
            .or(legacy.entity.as_deref())
            .and_then(|e| e.parse::<EntityKind>().ok());
        if entity != Some(EntityKind::Gemstone) {
            return Ok(None);
        }

        let mut warnings = Vec::new();
        let mut missing = |field: &str| warnings.push(SchemaWarning::new("gemstone", field));

        let schema_version = match stored.schema_version.as_deref().map(Version::parse) {
            Some(Ok(version)) => {
                if version.major > GEMSTONE_SCHEMA_VERSION.major {
                    tracing::debug!("Gemstone schema {} is newer than {}", version, GEMSTONE_SCHEMA_VERSION);
                }
                version.to_string()
            }
            Some(Err(_)) | None => {
                missing("schemaVersion");
                "1.0.0".to_string()
            }
        };

        let cut = match stored.cut.as_deref().or(legacy.cut.as_deref()) {
            Some(cut) => cut.parse()?,
            None => {
                missing("cut");
                GemstoneCut::default()
            }
        };

        let flip_face_normal = stored.flip_face_normal.or_else(|| legacy.flip()).unwrap_or_else(|| {
            missing("flipFaceNormal");
            false
        });

        let absolute_depth_offset = stored
            .absolute_depth_offset
            .or_else(|| LegacyGemstoneAttributes::number(&legacy.absolute_depth_offset))
            .unwrap_or_else(|| {
                missing("absoluteDepthOffset");
                0.0
            });

        let relative_depth_offset = stored
            .relative_depth_offset
            .or_else(|| LegacyGemstoneAttributes::number(&legacy.relative_depth_offset))
            .unwrap_or_else(|| {
                missing("relativeDepthOffset");
                0.0
            });

        let record = Self {
            schema_version,
            entity: EntityKind::Gemstone,
            cut,
            diameter: stored.diameter,
            flip_face_normal,
            absolute_depth_offset,
            relative_depth_offset,
            creation_parameters: stored.creation_parameters.unwrap_or_default(),
        };
        Ok(Some((record, warnings)))
    }
}

// ============== Extracted geometry ==============

/// Geometry of a gemstone body needed by prongs, channels and cutters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemstoneInfo {
    /// Centre of the girdle band
    pub centroid: DVec3,
    /// Direction the table faces (towards the crown)
    pub table_normal: DVec3,
    pub radius: f64,
    /// Absolute girdle height
    pub girdle_thickness: f64,
    pub flip_face_normal: bool,
    pub absolute_depth_offset: f64,
    pub relative_depth_offset: f64,
}

impl GemstoneInfo {
    pub fn new(centroid: DVec3, table_normal: DVec3, radius: f64) -> Self {
        Self {
            centroid,
            table_normal,
            radius,
            girdle_thickness: radius * 2.0 * GemstoneCut::Round.girdle_thickness(),
            flip_face_normal: false,
            absolute_depth_offset: 0.0,
            relative_depth_offset: 0.0,
        }
    }

    pub fn with_girdle_thickness(mut self, thickness: f64) -> Self {
        self.girdle_thickness = thickness;
        self
    }

    /// Copy flip and depth settings from persisted metadata
    pub fn with_record(mut self, record: &GemstoneRecord) -> Self {
        self.flip_face_normal = record.flip_face_normal;
        self.absolute_depth_offset = record.absolute_depth_offset;
        self.relative_depth_offset = record.relative_depth_offset;
        self
    }

    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }

    /// Unit crown direction; a flipped gemstone already faces into its face
    pub fn normalized_normal(&self) -> DVec3 {
        self.table_normal.try_normalize().unwrap_or(DVec3::Z)
    }

    /// Normal of the face the gemstone was seated on
    pub fn seat_normal(&self) -> DVec3 {
        if self.flip_face_normal {
            -self.normalized_normal()
        } else {
            self.normalized_normal()
        }
    }

    pub fn total_depth_offset(&self) -> f64 {
        self.absolute_depth_offset + self.relative_depth_offset * self.diameter()
    }
}

/// Diameter label for the gemstone info report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GemstoneSummary {
    pub centroid: DVec3,
    pub diameter_mm: f64,
    /// Diameter in millimetres with two decimals
    pub label: String,
    /// Label position, one radius above the girdle along the normal
    pub anchor: DVec3,
}

impl From<&GemstoneInfo> for GemstoneSummary {
    fn from(info: &GemstoneInfo) -> Self {
        let diameter_mm = info.diameter() * 10.0;
        Self {
            centroid: info.centroid,
            diameter_mm,
            label: format!("{:.2}", diameter_mm),
            anchor: info.centroid + info.normalized_normal() * info.radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_round_trip_fields() {
        let record = GemstoneRecord::new(0.15).with_flip(true).with_depth_offsets(0.01, 0.1);
        let json = record.to_json().unwrap();
        assert!(json.contains("\"flipFaceNormal\":true"));
        assert!(json.contains("\"entity\":\"gemstone\""));
        assert!(json.contains("\"schemaVersion\":\"2.0.0\""));

        let (read, warnings) = GemstoneRecord::read(Some(&json), &Default::default())
            .unwrap()
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(read, record);
    }

    #[test]
    fn test_missing_flip_defaults_to_false() {
        let json = r#"{"entity":"gemstone","diameter":0.1,"cut":"round","schemaVersion":"1.0.0","absoluteDepthOffset":0.0,"relativeDepthOffset":0.0}"#;
        let (record, warnings) = GemstoneRecord::read(Some(json), &Default::default())
            .unwrap()
            .unwrap();
        assert!(!record.flip_face_normal);
        assert_eq!(warnings, vec![SchemaWarning::new("gemstone", "flipFaceNormal")]);
    }

    #[test]
    fn test_newer_schema_is_read() {
        let json = r#"{"entity":"gemstone","diameter":0.1,"cut":"round","schemaVersion":"3.1.0","flipFaceNormal":false,"absoluteDepthOffset":0.0,"relativeDepthOffset":0.0}"#;
        let (record, _) = GemstoneRecord::read(Some(json), &Default::default())
            .unwrap()
            .unwrap();
        assert_eq!(record.schema_version, "3.1.0");
        assert!(Version::parse(&record.schema_version).unwrap() > GEMSTONE_SCHEMA_VERSION);
    }

    #[test]
    fn test_json_takes_precedence_over_legacy() {
        let legacy = LegacyGemstoneAttributes {
            entity: Some("gemstone".into()),
            is_flipped: Some("True".into()),
            absolute_depth_offset: Some("0.02".into()),
            ..Default::default()
        };
        let json = r#"{"entity":"gemstone","flipFaceNormal":false}"#;
        let (record, warnings) = GemstoneRecord::read(Some(json), &legacy).unwrap().unwrap();
        assert!(!record.flip_face_normal);
        assert_relative_eq!(record.absolute_depth_offset, 0.02);
        // schemaVersion, cut and relativeDepthOffset fall back to defaults
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_legacy_only_body() {
        let legacy = LegacyGemstoneAttributes {
            entity: Some("gemstone".into()),
            cut: Some("round".into()),
            is_flipped: Some("true".into()),
            ..Default::default()
        };
        let (record, _) = GemstoneRecord::read(None, &legacy).unwrap().unwrap();
        assert!(record.flip_face_normal);
        assert_eq!(record.diameter, None);
    }

    #[test]
    fn test_non_gemstone_entities() {
        let prong = EntityKind::Prong.properties_json();
        assert!(GemstoneRecord::read(Some(&prong), &Default::default()).unwrap().is_none());
        assert_eq!(EntityKind::read(Some(&prong), None), Some(EntityKind::Prong));
        assert_eq!(EntityKind::read(None, Some("cutter")), Some(EntityKind::Cutter));
        assert!(GemstoneRecord::read(Some("{not json"), &Default::default()).is_err());
    }

    #[test]
    fn test_info_offsets_and_summary() {
        let record = GemstoneRecord::new(0.2).with_flip(true).with_depth_offsets(0.01, 0.5);
        let info = GemstoneInfo::new(DVec3::ZERO, DVec3::new(0.0, 0.0, -2.0), 0.1).with_record(&record);
        assert_relative_eq!(info.total_depth_offset(), 0.11);
        assert_relative_eq!(info.seat_normal().z, 1.0);

        let summary = GemstoneSummary::from(&info);
        assert_eq!(summary.label, "2.00");
        assert_relative_eq!(summary.anchor.z, -0.1);
    }

    #[test]
    fn test_round_profile_is_unit_diameter() {
        let profile = GemstoneCut::Round.profile();
        let widest = profile.iter().map(|p| p.0).fold(0.0, f64::max);
        assert_relative_eq!(widest * 2.0, 1.0);
    }
}
