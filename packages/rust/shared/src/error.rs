//! Error types for csvagent.
//!
//! Library crates use [`CsvAgentError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all csvagent operations.
#[derive(Debug, thiserror::Error)]
pub enum CsvAgentError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// ZIP archive could not be opened or extracted.
    #[error("archive error: {0}")]
    Archive(String),

    /// Input discovery/selection failed (missing dir, no CSV files, ...).
    #[error("discovery error: {0}")]
    Discovery(String),

    /// CSV loading or merging error.
    #[error("dataset error: {message}")]
    Dataset { message: String },

    /// SQL generation, validation, or execution error.
    #[error("query error: {0}")]
    Query(String),

    /// Hosted language model error (HTTP, API, or response shape).
    #[error("model error: {0}")]
    Model(String),

    /// Embedded engine setup or load error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (blank question, bad flag combination, ...).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CsvAgentError>;

impl CsvAgentError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a dataset error from any displayable message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
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

    /// The message without the category prefix, for user-facing answers.
    pub fn detail(&self) -> String {
        match self {
            Self::Config { message } | Self::Dataset { message } | Self::Validation { message } => {
                message.clone()
            }
            Self::Archive(m)
            | Self::Discovery(m)
            | Self::Query(m)
            | Self::Model(m)
            | Self::Storage(m) => m.clone(),
            Self::Io { .. } => self.to_string(),
        }
    }
}
