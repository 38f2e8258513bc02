//! Error types for the pipeline stages
//!
//! Every failure is classified as either retryable (transient I/O or
//! warehouse trouble) or not (the data itself breaks the schema contract,
//! so a retry with the same file fails identically). "No new files" is not
//! an error at all; see [`crate::discover::Discovery::NoWork`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type covering all three pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Listing the input directory failed
    #[error("Discovery failed for '{path}': {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or appending the processed-file ledger failed
    #[error("Ledger access failed for '{path}': {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An expected column is absent from an input file
    #[error("Column '{column}' missing from '{file}'")]
    SchemaViolation { file: String, column: String },

    /// A value cannot be converted to a number after cleaning
    #[error("Cannot convert '{value}' in column '{column}' of '{file}' to a number")]
    CastFailure {
        file: String,
        column: String,
        value: String,
    },

    /// A warehouse operation outside any single artifact's transaction
    /// failed (connecting, or recording a committed artifact)
    #[error("Warehouse error: {0}")]
    Warehouse(String),

    /// File system operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file is structurally malformed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// Whether retrying the failed stage can succeed without human
    /// intervention. Data-contract violations cannot.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Discovery { .. }
            | PipelineError::Ledger { .. }
            | PipelineError::Warehouse(_)
            | PipelineError::Io(_) => true,
            PipelineError::SchemaViolation { .. }
            | PipelineError::CastFailure { .. }
            | PipelineError::Csv(_) => false,
        }
    }
}
