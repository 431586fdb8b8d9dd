//! Custom Features
//!
//! The ten parametric jewelry operations share one lifecycle:
//! `Uncomputed -> Computed -> (Editing -> Computed)* -> Deleted`.
//! A feature persists its parameter blob and the ids of the entities it
//! depends on; computing it is a pure function of those plus the current
//! document, so an edit with identical parameters reproduces the same bodies.

mod compute;
mod params;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use gk_core::gemstone::EntityKind;
use gk_core::{JewelryError, SchemaWarning};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use compute::{ComputeContext, ComputeOutput, OutputBody, OutputSketch, compute};
pub use params::{
    ChannelsBetweenGemstonesParams, CuttersForGemstonesParams, FeatureParams,
    GemstonesAtCirclesParams, GemstonesAtCurveParams, GemstonesAtPointsParams,
    GemstonesBetweenCurvesParams, ObjectsRefoldParams, ProngsAtPointsParams,
    ProngsBetweenGemstonesParams, SeatParams, SurfaceUnfoldParams,
};

/// Feature-related errors
#[derive(Debug, Clone, Error)]
pub enum FeatureError {
    #[error(transparent)]
    Jewelry(#[from] JewelryError),

    #[error("CAD kernel error: {0}")]
    CadError(#[from] crate::kernel::CadError),

    #[error("Feature not found: {0}")]
    FeatureNotFound(Uuid),

    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),

    #[error("Missing dependency '{0}'")]
    MissingDependency(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: FeatureState, to: FeatureState },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("A base feature edit is already in progress")]
    TransactionActive,
}

/// Result type for feature operations
pub type FeatureResult<T> = Result<T, FeatureError>;

// ============== Kinds ==============

/// The ten custom feature definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    GemstonesAtPoints,
    GemstonesAtCircles,
    GemstonesAtCurve,
    GemstonesBetweenCurves,
    ProngsAtPoints,
    ProngsBetweenGemstones,
    ChannelsBetweenGemstones,
    CuttersForGemstones,
    SurfaceUnfold,
    ObjectsRefold,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 10] = [
        FeatureKind::GemstonesAtPoints,
        FeatureKind::GemstonesAtCircles,
        FeatureKind::GemstonesAtCurve,
        FeatureKind::GemstonesBetweenCurves,
        FeatureKind::ProngsAtPoints,
        FeatureKind::ProngsBetweenGemstones,
        FeatureKind::ChannelsBetweenGemstones,
        FeatureKind::CuttersForGemstones,
        FeatureKind::SurfaceUnfold,
        FeatureKind::ObjectsRefold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::GemstonesAtPoints => "GemstonesAtPoints",
            FeatureKind::GemstonesAtCircles => "GemstonesAtCircles",
            FeatureKind::GemstonesAtCurve => "GemstonesAtCurve",
            FeatureKind::GemstonesBetweenCurves => "GemstonesBetweenCurves",
            FeatureKind::ProngsAtPoints => "ProngsAtPoints",
            FeatureKind::ProngsBetweenGemstones => "ProngsBetweenGemstones",
            FeatureKind::ChannelsBetweenGemstones => "ChannelsBetweenGemstones",
            FeatureKind::CuttersForGemstones => "CuttersForGemstones",
            FeatureKind::SurfaceUnfold => "SurfaceUnfold",
            FeatureKind::ObjectsRefold => "ObjectsRefold",
        }
    }

    /// Tag written on the bodies this kind creates, if any
    pub fn entity(&self) -> Option<EntityKind> {
        match self {
            FeatureKind::GemstonesAtPoints
            | FeatureKind::GemstonesAtCircles
            | FeatureKind::GemstonesAtCurve
            | FeatureKind::GemstonesBetweenCurves => Some(EntityKind::Gemstone),
            FeatureKind::ProngsAtPoints | FeatureKind::ProngsBetweenGemstones => Some(EntityKind::Prong),
            FeatureKind::ChannelsBetweenGemstones => Some(EntityKind::Channel),
            FeatureKind::CuttersForGemstones => Some(EntityKind::Cutter),
            FeatureKind::SurfaceUnfold | FeatureKind::ObjectsRefold => None,
        }
    }

    /// Edits create fresh bodies and leave the previous ones in the document
    pub fn creates_new_bodies_on_edit(&self) -> bool {
        matches!(self, FeatureKind::CuttersForGemstones)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureKind {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FeatureError::InvalidParameters(format!("unknown feature kind '{}'", s)))
    }
}

// ============== Lifecycle ==============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureState {
    #[default]
    Uncomputed,
    Computed,
    Editing,
    Deleted,
}

impl FeatureState {
    pub fn can_transition_to(self, to: FeatureState) -> bool {
        use FeatureState::*;
        matches!(
            (self, to),
            (Uncomputed, Computed)
                | (Uncomputed, Deleted)
                | (Computed, Computed)
                | (Computed, Editing)
                | (Computed, Deleted)
                | (Editing, Computed)
                | (Editing, Deleted)
        )
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A parametric operation tracked in the document timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFeature {
    /// Unique identifier
    pub id: Uuid,
    /// Name of the feature
    pub name: String,
    pub kind: FeatureKind,
    /// Persisted parameter blob, complete after the first compute
    pub parameters: serde_json::Value,
    /// Input entities by dependency id (`face`, `point0`, `curveA`, ...)
    pub dependencies: BTreeMap<String, Uuid>,
    /// Bodies owned by the feature's base feature, in creation order
    pub bodies: Vec<Uuid>,
    /// Sketch written by a surface unfold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sketch: Option<Uuid>,
    state: FeatureState,
    /// Fields recovered with defaults during the last compute
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SchemaWarning>,
}

impl CustomFeature {
    pub fn new(
        kind: FeatureKind,
        name: impl Into<String>,
        parameters: serde_json::Value,
        dependencies: BTreeMap<String, Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            parameters,
            dependencies,
            bodies: Vec::new(),
            sketch: None,
            state: FeatureState::Uncomputed,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> FeatureState {
        self.state
    }

    pub fn transition(&mut self, to: FeatureState) -> FeatureResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(FeatureError::InvalidTransition { from: self.state, to });
        }
        tracing::trace!("Feature {}: {} -> {}", self.name, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Id of a required dependency
    pub fn dependency(&self, name: &str) -> FeatureResult<Uuid> {
        self.dependencies
            .get(name)
            .copied()
            .ok_or_else(|| FeatureError::MissingDependency(name.to_string()))
    }

    /// Ids of `prefix0`, `prefix1`, ... up to the first gap
    pub fn indexed_dependencies(&self, prefix: &str) -> Vec<Uuid> {
        (0..)
            .map_while(|i| self.dependencies.get(&format!("{}{}", prefix, i)).copied())
            .collect()
    }

    /// Typed parameters with one warning per defaulted field
    pub fn params(&self) -> FeatureResult<(FeatureParams, Vec<SchemaWarning>)> {
        FeatureParams::parse(self.kind, &self.parameters)
    }
}

/// Dependency map `prefix0..prefixN` for an ordered selection
pub fn indexed(prefix: &str, ids: impl IntoIterator<Item = Uuid>) -> BTreeMap<String, Uuid> {
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| (format!("{}{}", prefix, i), id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine() {
        let mut feature = CustomFeature::new(
            FeatureKind::GemstonesAtPoints,
            "Gemstones",
            serde_json::Value::Null,
            BTreeMap::new(),
        );
        assert!(matches!(
            feature.transition(FeatureState::Editing),
            Err(FeatureError::InvalidTransition { .. })
        ));
        feature.transition(FeatureState::Computed).unwrap();
        feature.transition(FeatureState::Editing).unwrap();
        feature.transition(FeatureState::Computed).unwrap();
        feature.transition(FeatureState::Deleted).unwrap();
        assert!(feature.transition(FeatureState::Computed).is_err());
    }

    #[test]
    fn test_indexed_dependencies_stop_at_gap() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut dependencies = indexed("point", ids.clone());
        dependencies.remove("point1");
        let feature = CustomFeature::new(
            FeatureKind::GemstonesAtPoints,
            "Gemstones",
            serde_json::Value::Null,
            dependencies,
        );
        assert_eq!(feature.indexed_dependencies("point"), vec![ids[0]]);
        assert!(matches!(
            feature.dependency("face"),
            Err(FeatureError::MissingDependency(_))
        ));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(
            "cuttersforgemstones".parse::<FeatureKind>().unwrap(),
            FeatureKind::CuttersForGemstones
        );
        assert!("Extrude".parse::<FeatureKind>().is_err());
        assert!(FeatureKind::CuttersForGemstones.creates_new_bodies_on_edit());
        assert_eq!(FeatureKind::SurfaceUnfold.entity(), None);
    }
}
