//! Persisted feature parameters
//!
//! Every kind has a typed struct whose `Default` carries the documented
//! defaults. Blobs from older documents may lack fields; those are filled in
//! and reported as [`SchemaWarning`]s.

use gk_core::{
    BetweenCurvesParams, ChannelParams, CurvePlacementParams, CutterBottomType, CutterParams,
    NonlinearProfile, ProngAtPointParams, ProngParams, SchemaWarning, SeatOptions,
    UnfoldAlgorithm, UnfoldOptions,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{FeatureError, FeatureKind, FeatureResult};

/// Alternative spellings accepted for persisted fields
const FIELD_ALIASES: &[(&str, &str)] = &[("flipFaceNormal", "flip")];

/// Seating fields shared by the gemstone features
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeatParams {
    #[serde(alias = "flip")]
    pub flip_face_normal: bool,
    pub absolute_depth_offset: f64,
    pub relative_depth_offset: f64,
}

impl From<SeatParams> for SeatOptions {
    fn from(seat: SeatParams) -> Self {
        SeatOptions {
            flip_face_normal: seat.flip_face_normal,
            absolute_depth_offset: seat.absolute_depth_offset,
            relative_depth_offset: seat.relative_depth_offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GemstonesAtPointsParams {
    pub size: f64,
    #[serde(flatten)]
    pub seat: SeatParams,
}

impl Default for GemstonesAtPointsParams {
    fn default() -> Self {
        Self {
            size: 0.15,
            seat: SeatParams::default(),
        }
    }
}

/// Sizes come from the circles themselves
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GemstonesAtCirclesParams {
    #[serde(flatten)]
    pub seat: SeatParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GemstonesAtCurveParams {
    pub start_offset: f64,
    pub end_offset: f64,
    pub start_size: f64,
    pub end_size: f64,
    pub size_step: f64,
    pub target_gap: f64,
    pub flip_direction: bool,
    pub uniform: bool,
    pub nonlinear: bool,
    pub nonlinear_size: f64,
    pub nonlinear_position: f64,
    #[serde(flatten)]
    pub seat: SeatParams,
}

impl Default for GemstonesAtCurveParams {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            end_offset: 0.0,
            start_size: 0.1,
            end_size: 0.07,
            size_step: 0.005,
            target_gap: 0.01,
            flip_direction: false,
            uniform: false,
            nonlinear: false,
            nonlinear_size: 0.1,
            nonlinear_position: 0.5,
            seat: SeatParams::default(),
        }
    }
}

impl GemstonesAtCurveParams {
    pub fn placement(&self) -> CurvePlacementParams {
        let nonlinear = self.nonlinear.then_some(NonlinearProfile {
            size: self.nonlinear_size,
            position: self.nonlinear_position,
        });
        CurvePlacementParams::new()
            .with_offsets(self.start_offset, self.end_offset)
            .with_sizes(self.start_size, self.end_size)
            .with_size_step(self.size_step)
            .with_target_gap(self.target_gap)
            .with_uniform(self.uniform)
            .with_flip_direction(self.flip_direction)
            .with_nonlinear(nonlinear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GemstonesBetweenCurvesParams {
    pub start_offset: f64,
    pub end_offset: f64,
    pub size_step: f64,
    pub target_gap: f64,
    pub size_ratio: f64,
    pub flip_direction: bool,
    pub uniform: bool,
    #[serde(flatten)]
    pub seat: SeatParams,
}

impl Default for GemstonesBetweenCurvesParams {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            end_offset: 0.0,
            size_step: 0.005,
            target_gap: 0.01,
            size_ratio: 1.0,
            flip_direction: false,
            uniform: false,
            seat: SeatParams::default(),
        }
    }
}

impl GemstonesBetweenCurvesParams {
    pub fn placement(&self) -> BetweenCurvesParams {
        BetweenCurvesParams {
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            size_step: self.size_step,
            target_gap: self.target_gap,
            size_ratio: self.size_ratio,
            flip_direction: self.flip_direction,
            uniform: self.uniform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProngsAtPointsParams {
    pub size: f64,
    pub height: f64,
    /// Flat top; otherwise the top is rounded
    pub flat: bool,
}

impl Default for ProngsAtPointsParams {
    fn default() -> Self {
        let defaults = ProngAtPointParams::default();
        Self {
            size: defaults.size,
            height: defaults.height,
            flat: defaults.flat,
        }
    }
}

impl From<ProngsAtPointsParams> for ProngAtPointParams {
    fn from(params: ProngsAtPointsParams) -> Self {
        ProngAtPointParams {
            size: params.size,
            height: params.height,
            flat: params.flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProngsBetweenGemstonesParams {
    pub size_ratio: f64,
    pub height_ratio: f64,
    pub width_between_prongs_ratio: f64,
    pub max_gap: f64,
    pub weld_distance: f64,
}

impl Default for ProngsBetweenGemstonesParams {
    fn default() -> Self {
        let defaults = ProngParams::default();
        Self {
            size_ratio: defaults.size_ratio,
            height_ratio: defaults.height_ratio,
            width_between_prongs_ratio: defaults.width_between_prongs_ratio,
            max_gap: defaults.max_gap,
            weld_distance: defaults.weld_distance,
        }
    }
}

impl From<ProngsBetweenGemstonesParams> for ProngParams {
    fn from(params: ProngsBetweenGemstonesParams) -> Self {
        ProngParams {
            size_ratio: params.size_ratio,
            height_ratio: params.height_ratio,
            width_between_prongs_ratio: params.width_between_prongs_ratio,
            max_gap: params.max_gap,
            weld_distance: params.weld_distance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelsBetweenGemstonesParams {
    pub ratio: f64,
    pub max_gap: f64,
}

impl Default for ChannelsBetweenGemstonesParams {
    fn default() -> Self {
        let defaults = ChannelParams::default();
        Self {
            ratio: defaults.ratio,
            max_gap: defaults.max_gap,
        }
    }
}

impl From<ChannelsBetweenGemstonesParams> for ChannelParams {
    fn from(params: ChannelsBetweenGemstonesParams) -> Self {
        ChannelParams {
            ratio: params.ratio,
            max_gap: params.max_gap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CuttersForGemstonesParams {
    pub bottom_type: CutterBottomType,
    pub height: f64,
    pub depth: f64,
    pub size_ratio: f64,
    pub hole_ratio: f64,
    /// Degrees
    pub cone_angle: f64,
}

impl Default for CuttersForGemstonesParams {
    fn default() -> Self {
        let defaults = CutterParams::default();
        Self {
            bottom_type: defaults.bottom_type,
            height: defaults.height,
            depth: defaults.depth,
            size_ratio: defaults.size_ratio,
            hole_ratio: defaults.hole_ratio,
            cone_angle: defaults.cone_angle,
        }
    }
}

impl From<CuttersForGemstonesParams> for CutterParams {
    fn from(params: CuttersForGemstonesParams) -> Self {
        CutterParams {
            bottom_type: params.bottom_type,
            height: params.height,
            depth: params.depth,
            size_ratio: params.size_ratio,
            hole_ratio: params.hole_ratio,
            cone_angle: params.cone_angle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SurfaceUnfoldParams {
    pub accuracy: f64,
    pub algorithm: UnfoldAlgorithm,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Default for SurfaceUnfoldParams {
    fn default() -> Self {
        let defaults = UnfoldOptions::default();
        Self {
            accuracy: defaults.accuracy,
            algorithm: defaults.algorithm,
            x_offset: defaults.x_offset,
            y_offset: defaults.y_offset,
        }
    }
}

impl SurfaceUnfoldParams {
    pub fn options(&self, plane: gk_core::Plane) -> UnfoldOptions {
        UnfoldOptions::default()
            .with_accuracy(self.accuracy)
            .with_algorithm(self.algorithm)
            .with_offsets(self.x_offset, self.y_offset)
            .with_plane(plane)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectsRefoldParams {}

// ============== Sum type ==============

/// Typed parameters of any feature kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureParams {
    GemstonesAtPoints(GemstonesAtPointsParams),
    GemstonesAtCircles(GemstonesAtCirclesParams),
    GemstonesAtCurve(GemstonesAtCurveParams),
    GemstonesBetweenCurves(GemstonesBetweenCurvesParams),
    ProngsAtPoints(ProngsAtPointsParams),
    ProngsBetweenGemstones(ProngsBetweenGemstonesParams),
    ChannelsBetweenGemstones(ChannelsBetweenGemstonesParams),
    CuttersForGemstones(CuttersForGemstonesParams),
    SurfaceUnfold(SurfaceUnfoldParams),
    ObjectsRefold(ObjectsRefoldParams),
}

fn parse_typed<T>(kind: FeatureKind, value: &Value) -> FeatureResult<(T, Vec<SchemaWarning>)>
where
    T: Serialize + DeserializeOwned + Default,
{
    let provided = match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(FeatureError::InvalidParameters(format!(
                "{} parameters must be an object, got {}",
                kind, other
            )));
        }
    };

    let params: T = serde_json::from_value(Value::Object(provided.clone()))
        .map_err(|e| FeatureError::InvalidParameters(format!("{}: {}", kind, e)))?;

    let defaults = serde_json::to_value(T::default())
        .map_err(|e| FeatureError::InvalidParameters(e.to_string()))?;
    let is_provided = |field: &str| {
        provided.contains_key(field)
            || FIELD_ALIASES
                .iter()
                .any(|(name, alias)| *name == field && provided.contains_key(*alias))
    };
    let warnings = defaults
        .as_object()
        .into_iter()
        .flat_map(|fields| fields.keys())
        .filter(|field| !is_provided(field.as_str()))
        .map(|field| SchemaWarning::new(kind.name(), field.as_str()))
        .collect();

    Ok((params, warnings))
}

impl FeatureParams {
    /// Read a persisted blob, defaulting absent fields
    pub fn parse(kind: FeatureKind, value: &Value) -> FeatureResult<(Self, Vec<SchemaWarning>)> {
        Ok(match kind {
            FeatureKind::GemstonesAtPoints => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::GemstonesAtPoints(p), w)
            }
            FeatureKind::GemstonesAtCircles => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::GemstonesAtCircles(p), w)
            }
            FeatureKind::GemstonesAtCurve => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::GemstonesAtCurve(p), w)
            }
            FeatureKind::GemstonesBetweenCurves => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::GemstonesBetweenCurves(p), w)
            }
            FeatureKind::ProngsAtPoints => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::ProngsAtPoints(p), w)
            }
            FeatureKind::ProngsBetweenGemstones => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::ProngsBetweenGemstones(p), w)
            }
            FeatureKind::ChannelsBetweenGemstones => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::ChannelsBetweenGemstones(p), w)
            }
            FeatureKind::CuttersForGemstones => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::CuttersForGemstones(p), w)
            }
            FeatureKind::SurfaceUnfold => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::SurfaceUnfold(p), w)
            }
            FeatureKind::ObjectsRefold => {
                let (p, w) = parse_typed(kind, value)?;
                (FeatureParams::ObjectsRefold(p), w)
            }
        })
    }

    pub fn defaults(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::GemstonesAtPoints => FeatureParams::GemstonesAtPoints(Default::default()),
            FeatureKind::GemstonesAtCircles => FeatureParams::GemstonesAtCircles(Default::default()),
            FeatureKind::GemstonesAtCurve => FeatureParams::GemstonesAtCurve(Default::default()),
            FeatureKind::GemstonesBetweenCurves => {
                FeatureParams::GemstonesBetweenCurves(Default::default())
            }
            FeatureKind::ProngsAtPoints => FeatureParams::ProngsAtPoints(Default::default()),
            FeatureKind::ProngsBetweenGemstones => {
                FeatureParams::ProngsBetweenGemstones(Default::default())
            }
            FeatureKind::ChannelsBetweenGemstones => {
                FeatureParams::ChannelsBetweenGemstones(Default::default())
            }
            FeatureKind::CuttersForGemstones => FeatureParams::CuttersForGemstones(Default::default()),
            FeatureKind::SurfaceUnfold => FeatureParams::SurfaceUnfold(Default::default()),
            FeatureKind::ObjectsRefold => FeatureParams::ObjectsRefold(Default::default()),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureParams::GemstonesAtPoints(_) => FeatureKind::GemstonesAtPoints,
            FeatureParams::GemstonesAtCircles(_) => FeatureKind::GemstonesAtCircles,
            FeatureParams::GemstonesAtCurve(_) => FeatureKind::GemstonesAtCurve,
            FeatureParams::GemstonesBetweenCurves(_) => FeatureKind::GemstonesBetweenCurves,
            FeatureParams::ProngsAtPoints(_) => FeatureKind::ProngsAtPoints,
            FeatureParams::ProngsBetweenGemstones(_) => FeatureKind::ProngsBetweenGemstones,
            FeatureParams::ChannelsBetweenGemstones(_) => FeatureKind::ChannelsBetweenGemstones,
            FeatureParams::CuttersForGemstones(_) => FeatureKind::CuttersForGemstones,
            FeatureParams::SurfaceUnfold(_) => FeatureKind::SurfaceUnfold,
            FeatureParams::ObjectsRefold(_) => FeatureKind::ObjectsRefold,
        }
    }

    /// Complete blob as persisted on the feature
    pub fn to_value(&self) -> FeatureResult<Value> {
        let value = match self {
            FeatureParams::GemstonesAtPoints(p) => serde_json::to_value(p),
            FeatureParams::GemstonesAtCircles(p) => serde_json::to_value(p),
            FeatureParams::GemstonesAtCurve(p) => serde_json::to_value(p),
            FeatureParams::GemstonesBetweenCurves(p) => serde_json::to_value(p),
            FeatureParams::ProngsAtPoints(p) => serde_json::to_value(p),
            FeatureParams::ProngsBetweenGemstones(p) => serde_json::to_value(p),
            FeatureParams::ChannelsBetweenGemstones(p) => serde_json::to_value(p),
            FeatureParams::CuttersForGemstones(p) => serde_json::to_value(p),
            FeatureParams::SurfaceUnfold(p) => serde_json::to_value(p),
            FeatureParams::ObjectsRefold(p) => serde_json::to_value(p),
        };
        value.map_err(|e| FeatureError::InvalidParameters(e.to_string()))
    }
}
