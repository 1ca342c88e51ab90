//! Validation errors for locally constructed inputs

use std::path::PathBuf;
use thiserror::Error;

/// Malformed local input, detected before anything is sent to the platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Source directory is missing or not a directory
    #[error("source directory not found: {}", .0.display())]
    SourceDirectoryMissing(PathBuf),

    /// Entry script is missing from the source directory
    #[error("entry script '{script}' not found in {}", .directory.display())]
    EntryScriptMissing { directory: PathBuf, script: String },

    /// A required field was empty
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// Argument name is empty or contains whitespace
    #[error("invalid argument name '{0}'")]
    InvalidArgumentName(String),

    /// The same argument name was supplied twice
    #[error("argument '--{0}' supplied more than once")]
    DuplicateArgument(String),

    /// A pipeline step consumes an output that no earlier step produces
    #[error("step '{step}' consumes output '{output}' which no earlier step declares")]
    UnresolvedOutput { step: String, output: String },

    /// Two pipeline steps share a name
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),

    /// Two pipeline steps declare the same output
    #[error("output '{0}' is declared by more than one step")]
    DuplicateOutput(String),

    /// A pipeline was compiled without steps
    #[error("pipeline '{0}' has no steps")]
    EmptyPipeline(String),

    /// Sweep limits or search space are inconsistent
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    /// Schedule recurrence is inconsistent
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A run cannot yield the requested artifact
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// A manifest file could not be read or parsed
    #[error("invalid manifest {}: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    /// Tabular input does not have the expected shape
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for validation
pub type Result<T> = std::result::Result<T, ValidationError>;
