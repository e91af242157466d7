//! Error types for WikiScope.
//!
//! Library crates use [`WikiScopeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Recoverable anomalies from the rebuild pipeline (a category that
//! normalizes to an empty key, a project key with no matching page) are not
//! error variants: they are skipped locally with a diagnostic and surface as
//! `None`/counters instead.

use std::path::PathBuf;

/// Top-level error type for all WikiScope operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiScopeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Store query, bulk-insert, or DDL error.
    #[error("store error: {0}")]
    Store(String),

    /// The atomic staging-to-live swap failed. The prior live generation is
    /// left untouched.
    #[error("promotion error: {0}")]
    Promotion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty category set, malformed key, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WikiScopeError>;

impl WikiScopeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
