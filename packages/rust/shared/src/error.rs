//! Error types for the enricher.
//!
//! Library crates use [`EnricherError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all enricher operations.
#[derive(Debug, thiserror::Error)]
pub enum EnricherError {
    /// Configuration loading or validation error. Raised before any network activity.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (client construction, connection).
    #[error("network error: {0}")]
    Network(String),

    /// An external model service failed terminally or exhausted its retries.
    #[error("{service} failed after {attempts} attempt(s): {message}")]
    Service {
        service: String,
        attempts: u32,
        message: String,
    },

    /// Enrichment output does not line up with the chunk it was produced for.
    #[error("data integrity error: {0}")]
    Integrity(String),

    /// Creating a dataset/table or appending rows failed; the chunk is not done.
    #[error("load error: {0}")]
    Load(String),

    /// Warehouse query or catalog error.
    #[error("warehouse error: {0}")]
    Warehouse(String),

    /// Prompt or query template could not be loaded or rendered.
    #[error("template error: {message}")]
    Template { message: String },

    /// Response or row parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid identifier, missing identity key, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EnricherError>;

impl EnricherError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a template error from any displayable message.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// A service call that gave up after `attempts` tries.
    pub fn service(service: impl Into<String>, attempts: u32, msg: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            attempts,
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
