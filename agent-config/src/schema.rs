//! Strongly typed configuration schemas.

use std::collections::HashSet;
use std::path::PathBuf;

use agent_primitives::AgentId;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// One backend in the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSpec {
    /// Session-scoped in-memory records.
    #[default]
    State,
    /// Records persisted in a namespaced key-value store.
    Store {
        /// Agent owning the namespace.
        agent_id: String,
        /// Directory for a JSON file store; in-memory when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        directory: Option<PathBuf>,
    },
    /// A sandboxed directory on local disk.
    Filesystem {
        /// Sandbox root; created when missing.
        root: PathBuf,
    },
}

impl BackendSpec {
    /// Checks identifiers embedded in this backend description.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Primitive`] for an invalid agent identifier.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Self::Store { agent_id, .. } = self {
            AgentId::new(agent_id.as_str())?;
        }
        Ok(())
    }
}

/// A backend mounted under a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Path prefix, e.g. `/memories/`.
    pub prefix: String,
    /// Backend serving the prefix.
    pub backend: BackendSpec,
}

/// Full backend topology: a default backend plus prefix routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend serving paths that match no route.
    #[serde(default)]
    pub default: BackendSpec,
    /// Prefix routes; order is irrelevant, the longest prefix wins.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

impl BackendConfig {
    /// Checks prefixes and embedded identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for empty or unrooted prefixes,
    /// [`ConfigError::DuplicatePrefix`] when a prefix repeats and
    /// [`ConfigError::Primitive`] for invalid agent identifiers.
    pub fn validate(&self) -> ConfigResult<()> {
        self.default.validate()?;

        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.prefix.is_empty() {
                return Err(ConfigError::Invalid("route prefix must not be empty"));
            }
            if !route.prefix.starts_with('/') {
                return Err(ConfigError::Invalid("route prefix must start with `/`"));
            }
            if !seen.insert(route.prefix.as_str()) {
                return Err(ConfigError::DuplicatePrefix(route.prefix.clone()));
            }
            route.backend.validate()?;
        }
        Ok(())
    }
}
