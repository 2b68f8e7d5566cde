//! Configuration loader implementations.

use std::path::Path;
use std::sync::Arc;

use agent_backends::{
    BackendProtocol, CompositeBackend, FilesystemBackend, JsonFileStore, KeyValueStore,
    LocalSandbox, MemoryStore, Route, StateBackend, StoreBackend,
};
use agent_primitives::AgentId;
use tokio::fs;
use tracing::{debug, info};

use crate::schema::{BackendConfig, BackendSpec};
use crate::ConfigResult;

/// Environment variable naming the configuration file read by
/// [`BackendConfig::from_env`].
pub const CONFIG_ENV: &str = "AGENT_BACKENDS_CONFIG";

impl BackendConfig {
    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a JSON error for malformed input or a validation error.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the file cannot be read, then the errors of
    /// [`from_json_str`](Self::from_json_str).
    pub async fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).await?;
        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), routes = config.routes.len(), "backend config loaded");
        Ok(config)
    }

    /// Loads the file named by [`CONFIG_ENV`], or the default topology when
    /// the variable is unset.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`load`](Self::load).
    pub async fn from_env() -> ConfigResult<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path).await,
            None => {
                debug!(var = CONFIG_ENV, "no backend config set; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validates the topology and instantiates every backend in it.
    ///
    /// Without routes the default backend is returned as is; otherwise the
    /// backends are wrapped in a [`CompositeBackend`].
    ///
    /// # Errors
    ///
    /// Returns validation errors, or I/O errors raised while opening store
    /// directories and sandbox roots.
    pub async fn build(&self) -> ConfigResult<Arc<dyn BackendProtocol>> {
        self.validate()?;

        let default = build_backend(&self.default).await?;
        if self.routes.is_empty() {
            info!(backend = default.name(), "backend topology built without routes");
            return Ok(default);
        }

        let mut routes = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            routes.push(Route::new(
                route.prefix.clone(),
                build_backend(&route.backend).await?,
            ));
        }
        Ok(Arc::new(CompositeBackend::new(default, routes)?))
    }
}

async fn build_backend(spec: &BackendSpec) -> ConfigResult<Arc<dyn BackendProtocol>> {
    let backend: Arc<dyn BackendProtocol> = match spec {
        BackendSpec::State => Arc::new(StateBackend::new()),
        BackendSpec::Store {
            agent_id,
            directory,
        } => {
            let agent_id = AgentId::new(agent_id.as_str())?;
            let store: Arc<dyn KeyValueStore> = match directory {
                Some(dir) => Arc::new(JsonFileStore::open(dir.clone()).await?),
                None => Arc::new(MemoryStore::new()),
            };
            Arc::new(StoreBackend::new(store, agent_id))
        }
        BackendSpec::Filesystem { root } => {
            fs::create_dir_all(root).await?;
            Arc::new(FilesystemBackend::new(Arc::new(LocalSandbox::new(
                root.clone(),
            ))))
        }
    };
    Ok(backend)
}
