//! Error types for the backend subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Infrastructure errors emitted by storage backends.
///
/// Domain outcomes such as "edit target missing" are reported through the
/// `error` field of [`WriteResult`](crate::WriteResult) and
/// [`EditResult`](crate::EditResult) instead.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No record exists at the requested path.
    #[error("file not found: {0}")]
    NotFound(String),
    /// A regular expression or glob pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as supplied by the caller.
        pattern: String,
        /// Compilation error reported by the regex engine.
        #[source]
        source: regex::Error,
    },
    /// A path resolved outside of the sandbox root.
    #[error("path escapes sandbox: {0}")]
    PathEscapesSandbox(String),
    /// The injected key-value store reported a failure.
    #[error("store error: {reason}")]
    Store {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// A composite route was configured incorrectly.
    #[error("invalid route: {0}")]
    InvalidRoute(&'static str),
    /// Underlying I/O failure.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
}

impl BackendError {
    /// Helper to construct not-found errors from string-like paths.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Helper to construct store errors from string-like values.
    #[must_use]
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the error reports a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io { source } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
