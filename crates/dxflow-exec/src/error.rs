//! Error types for command execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while executing a single command.
///
/// None of these abort a queue: the runner turns them into a result without
/// an exit code and moves on.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command failed validation against the operation vocabulary.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The process could not be started.
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        source: std::io::Error,
    },

    /// Timeout waiting for command.
    #[error("Command timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Environment profile could not be read.
    #[error("Failed to read environment profile {path}: {source}")]
    Profile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for command execution.
pub type ExecResult<T> = std::result::Result<T, ExecError>;
