//! FILENAME: core/cube-engine/src/error.rs
//! PURPOSE: Error type shared by every cube, store and dimension operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Measure already exists: {0}")]
    DuplicateMeasure(String),

    #[error("Unknown measure: {0}")]
    UnknownMeasure(String),

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Dimension already exists: {0}")]
    DuplicateDimension(String),

    #[error("Unknown item '{item}' in dimension {dimension}")]
    UnknownItem { dimension: String, item: String },

    #[error("Unknown attribute '{attribute}' in dimension {dimension}")]
    UnknownAttribute { dimension: String, attribute: String },

    #[error("Duplicate item '{item}' in dimension {dimension}")]
    DuplicateItem { dimension: String, item: String },

    #[error("Incompatible dimension {dimension}: {reason}")]
    IncompatibleDimension { dimension: String, reason: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Missing distribution weight at index {index}")]
    MissingDistribution { index: usize },

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Default value must be 0 or NaN, got {0}")]
    InvalidDefaultValue(f64),

    #[error("Invalid time slot: {0}")]
    InvalidTimeSlot(String),

    #[error("Missing coordinate for dimension {0}")]
    MissingCoordinate(String),

    #[error("Formula error: {0}")]
    Formula(#[from] measure_parser::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Codec error: {0}")]
    Codec(String),
}

pub type CubeResult<T> = Result<T, CubeError>;

impl CubeError {
    pub(crate) fn incompatible(dimension: &str, reason: impl Into<String>) -> Self {
        CubeError::IncompatibleDimension {
            dimension: dimension.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_attribute(dimension: &str, attribute: &str) -> Self {
        CubeError::UnknownAttribute {
            dimension: dimension.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn unknown_item(dimension: &str, item: &str) -> Self {
        CubeError::UnknownItem {
            dimension: dimension.to_string(),
            item: item.to_string(),
        }
    }
}
