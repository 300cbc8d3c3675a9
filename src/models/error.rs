//! Error types for tfresume.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Checkpoint content is not what we expected (corrupt, foreign run)
//! - I^B materialized: The file system refused an operation
//! - K_i violated: A record breaks a documented limit before it is ever written

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level error type for tfresume.
///
/// None of these are fatal to the host process: the store turns every
/// variant into either "no checkpoint" (read) or "write skipped" (write).
#[derive(Debug, Error)]
pub enum ResumeError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Stored content rejected
    // ═══════════════════════════════════════════════════════════════════

    #[error("Corrupt checkpoint content: {0}")]
    ContentCorrupt(String),

    #[error("Checkpoint value out of range: {0}")]
    RangeInvalid(String),

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — File system unavailable
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error {context} '{}': {source}", .path.display())]
    Io {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED — Documented limit exceeded
    // ═══════════════════════════════════════════════════════════════════

    #[error("{what} exceeds limit of {limit}")]
    Capacity { what: String, limit: usize },
}

impl ResumeError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::ContentCorrupt(message.into())
    }

    pub fn range(message: impl Into<String>) -> Self {
        Self::RangeInvalid(message.into())
    }

    pub fn capacity(what: impl Into<String>, limit: usize) -> Self {
        Self::Capacity {
            what: what.into(),
            limit,
        }
    }

    /// Check if this error should send the reader down the
    /// quarantine / backup-promotion path.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ContentCorrupt(_) | Self::RangeInvalid(_))
    }
}

/// Result type alias for tfresume.
pub type Result<T> = std::result::Result<T, ResumeError>;
