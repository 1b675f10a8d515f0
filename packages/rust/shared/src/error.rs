//! Error types for Clausier.
//!
//! Library crates use [`ClausierError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Recoverable problems met while assembling a contract are not errors:
//! they are reported as [`MergeWarning`](crate::MergeWarning) values.

use std::path::PathBuf;

/// Top-level error type for all Clausier operations.
#[derive(Debug, thiserror::Error)]
pub enum ClausierError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Zip container error while reading or writing a document package.
    #[error("package error: {0}")]
    Package(String),

    /// Malformed XML inside a document part.
    #[error("xml error: {message}")]
    Xml { message: String },

    /// Data validation error (broken invariant, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Assembly was requested without a single clause.
    #[error("no clauses were provided for assembly")]
    NoClausesProvided,

    /// A clause source could not be turned into a document.
    #[error("cannot load clause {path:?}: {message}")]
    ClauseLoad { path: PathBuf, message: String },

    /// Summary generation failed (bad response, missing key, empty text).
    #[error("summary error: {0}")]
    Summary(String),

    /// Network/HTTP error while talking to the text generator.
    #[error("network error: {0}")]
    Network(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClausierError>;

impl ClausierError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an XML error from any displayable message.
    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a clause load error for the given source path.
    pub fn clause_load(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ClauseLoad {
            path: path.into(),
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
