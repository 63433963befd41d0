//! Error types for the persistence seam.

use thiserror::Error;

/// Result type alias using the store error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or writing run records.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
