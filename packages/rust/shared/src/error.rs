//! Error types for GraphQnA.
//!
//! Library crates use [`GraphQnaError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all GraphQnA operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphQnaError {
    /// Configuration loading or validation error. The only error the
    /// orchestrator façade propagates to its callers.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an engine or the LLM endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// A retrieval engine answered, but not usefully (bad status payload, no answer).
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// The classification capability failed.
    #[error("classification error: {0}")]
    Classification(String),

    /// Response decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (empty question, invalid field, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GraphQnaError>;

impl GraphQnaError {
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

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
