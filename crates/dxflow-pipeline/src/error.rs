//! Error types for graph construction and registration.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur during pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A precondition failed; nothing was submitted or mutated.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The run store could not be read or written.
    #[error("Store error: {0}")]
    Store(#[from] dxflow_types::Error),

    /// Command execution could not be set up.
    #[error("Execution error: {0}")]
    Exec(#[from] dxflow_exec::ExecError),

    /// Local filesystem error (output or working directory creation).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

/// Fatal preconditions for graph construction and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("attempt {0} not found")]
    AttemptNotFound(i64),

    #[error("sample {0} not found")]
    SampleNotFound(i64),

    #[error("no samples aggregated for attempt {attempt_id}")]
    NoSamples { attempt_id: i64 },

    #[error("run attribute '{name}' is missing")]
    MissingRunAttribute { name: String },

    #[error("no sample carries a subject name")]
    NoSubjectName,

    #[error("multiple subject names across samples: {}", .0.join(", "))]
    MultipleSubjectNames(Vec<String>),

    #[error("subject name is empty")]
    EmptySubjectName,

    #[error("required setting '{name}' is not configured")]
    MissingSetting { name: String },

    #[error("{kind} does not exist: {}", .path.display())]
    MissingReferenceFile { kind: String, path: PathBuf },

    #[error("no file ending in '{suffix}' in {}", .dir.display())]
    InputNotFound { suffix: String, dir: PathBuf },

    #[error("{} files ending in '{suffix}': {}", .matches.len(), display_paths(.matches))]
    AmbiguousInput { suffix: String, matches: Vec<PathBuf> },

    #[error("invalid trigger envelope: {0}")]
    InvalidEnvelope(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
