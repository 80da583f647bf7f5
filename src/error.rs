//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = PrepError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, discovery, or extraction.
#[derive(Debug, Error)]
pub enum PrepError {
    /// Pipeline configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The configured source directory does not exist.
    #[error("source directory {0:?} not found")]
    MissingSource(PathBuf),
    /// The source directory holds no file with a recognised shard suffix.
    #[error("no compressed shards found in {0:?}")]
    NoShards(PathBuf),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A shard could not be decoded into UTF-8 text.
    #[error("failed to decode {path:?}: {reason}")]
    Decode {
        /// Shard being decoded.
        path: PathBuf,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PrepError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Returns `true` for errors that abort the pipeline before any output is written.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_) | Self::MissingSource(_) | Self::NoShards(_)
        )
    }
}
