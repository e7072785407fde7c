//! Error types for Amorsize
//!
//! The library deliberately exposes very few failure modes. The decision
//! engine treats its own result as total: sampling failures, cache problems,
//! and platform probe failures all degrade into a serial recommendation or a
//! cache miss instead of an error. Only two things surface as `Err`:
//!
//! - caller misuse (invalid options, out-of-range parameters)
//! - explicit cache export/import operations the caller asked for

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the Amorsize API
#[derive(Debug, Error)]
pub enum AmorsizeError {
    /// Invalid parameter supplied by the caller
    #[error("invalid parameter: {0}")]
    Validation(String),

    /// Cache export failed (I/O or serialization)
    #[error("failed to export cache to {path}: {message}")]
    CacheExport { path: PathBuf, message: String },

    /// Cache import failed (missing file, bad format, version mismatch)
    #[error("failed to import cache from {path}: {message}")]
    CacheImport { path: PathBuf, message: String },
}

/// Result type used throughout the Amorsize library
pub type Result<T> = std::result::Result<T, AmorsizeError>;

impl AmorsizeError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        AmorsizeError::Validation(message.into())
    }
}
