//! Error types for the run pipeline.

use thiserror::Error;

/// Everything that can stop a run.
///
/// `DataUnavailable` is fatal only for imagery; DEM and vector gaps are
/// absorbed by the orchestrator's fallbacks before they become errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameters { name: String, reason: String },

    #[error("computation error: {0}")]
    Computation(String),

    #[error("raster size mismatch: expected {expected} cells, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("output sink rejected artifacts: {0}")]
    Output(String),
}

impl PipelineError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameters { name: name.into(), reason: reason.into() }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
