//! Errors raised while loading or assembling a backend topology.

use agent_backends::BackendError;
use thiserror::Error;

/// Failures surfaced by the configuration layer.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid JSON for the schema.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// An identifier in the configuration failed validation.
    #[error(transparent)]
    Primitive(#[from] agent_primitives::Error),
    /// A backend could not be constructed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Two routes share the same prefix.
    #[error("duplicate route prefix `{0}`")]
    DuplicatePrefix(String),
    /// The topology violates a structural rule.
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
