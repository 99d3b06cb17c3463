//! Error types for the cleaning pipeline and the zone ranking queries.

use thiserror::Error;

/// Fatal errors raised while preparing or running a cleaning job.
///
/// Row-level problems are never reported here; those are logged drops.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required input artifact is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Zone lookup has a header row but lacks a required column.
    #[error("configuration error: zone lookup is missing required column '{column}'")]
    MissingColumn { column: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    /// `true` for the error kinds that mean the run could not be configured.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::MissingColumn { .. }
        )
    }
}

/// Errors raised by the zone counting and ranking entry points.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// Record at `index` does not carry an integer pickup zone identifier.
    #[error("record {index} has no pickup zone identifier")]
    MissingZoneId { index: usize },
}

/// Result type alias for PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
