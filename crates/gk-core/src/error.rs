//! Error taxonomy of the computational core

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by placement, proximity, cutter and unfold operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JewelryError {
    #[error("Insufficient selection: {0}")]
    InsufficientSelection(String),

    #[error("Insufficient gemstones: found {found}, at least 2 are required")]
    InsufficientGemstones { found: usize },

    #[error("Gemstone size {size} is below the minimum of {minimum}")]
    SizeBelowMinimum { size: f64, minimum: f64 },

    #[error("Point lies outside the unfolded patch: {0}")]
    OutOfBoundsUnfold(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Schema error: {0}")]
    Schema(String),
}

/// Result type for core operations
pub type JewelryResult<T> = Result<T, JewelryError>;

/// A persisted field that was missing and replaced by its default.
///
/// Never surfaced as a failure; callers collect and log it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaWarning {
    /// What was being read (e.g. `gemstone`, `GemstonesAtCurve`)
    pub context: String,
    /// Name of the missing field
    pub field: String,
}

impl SchemaWarning {
    pub fn new(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            field: field.into(),
        }
    }

    /// Emit the warning through `tracing`
    pub fn log(&self) {
        tracing::warn!("{}: missing field '{}', using default", self.context, self.field);
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} defaulted", self.context, self.field)
    }
}

/// Reject non-finite or out-of-range values with a uniform message
pub(crate) fn check_range(name: &str, value: f64, min: f64, max: f64) -> JewelryResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(JewelryError::InvalidParameter(format!(
            "{} must be within {}..={}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range("ratio", 0.35, 0.1, 0.5).is_ok());
        assert!(check_range("ratio", 0.6, 0.1, 0.5).is_err());
        assert!(check_range("ratio", f64::NAN, 0.1, 0.5).is_err());
    }

    #[test]
    fn test_warning_display() {
        let warning = SchemaWarning::new("gemstone", "flipFaceNormal");
        assert_eq!(warning.to_string(), "gemstone.flipFaceNormal defaulted");
    }
}
