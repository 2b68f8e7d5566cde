//! Prefix-routing backend presenting several backends as one namespace.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::ops;
use crate::protocol::BackendProtocol;
use crate::record::{EditResult, EntryInfo, GrepMatch, WriteResult};
use crate::{BackendError, BackendResult};

/// A `(prefix, backend)` pair configured on a [`CompositeBackend`].
#[derive(Clone)]
pub struct Route {
    prefix: String,
    backend: Arc<dyn BackendProtocol>,
}

impl Route {
    /// Creates a route sending paths under `prefix` to `backend`.
    pub fn new(prefix: impl Into<String>, backend: Arc<dyn BackendProtocol>) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the routed backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn BackendProtocol> {
        &self.backend
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("prefix", &self.prefix)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// A backend that failed while serving a fan-out query.
#[derive(Debug)]
pub struct RouteFailure {
    /// Prefix of the failing route; empty for the default backend.
    pub prefix: String,
    /// Error reported by the backend.
    pub error: BackendError,
}

/// Results of a best-effort fan-out together with the routes that failed.
#[derive(Debug)]
pub struct Gathered<T> {
    /// Merged, re-prefixed and deduplicated results.
    pub items: Vec<T>,
    /// Backends whose results are missing from `items`.
    pub failures: Vec<RouteFailure>,
}

impl<T> Default for Gathered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Gathered<T> {
    /// Returns `true` when every backend answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Converts into a strict result, failing with the first route error.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed route, if any.
    pub fn into_strict(mut self) -> BackendResult<Vec<T>> {
        if self.failures.is_empty() {
            Ok(self.items)
        } else {
            Err(self.failures.swap_remove(0).error)
        }
    }
}

/// Items whose paths are rewritten when they cross a route boundary.
trait Routed {
    fn path_mut(&mut self) -> &mut String;
    fn identity(&self) -> (String, usize);
}

impl Routed for EntryInfo {
    fn path_mut(&mut self) -> &mut String {
        &mut self.path
    }

    fn identity(&self) -> (String, usize) {
        (self.path.clone(), 0)
    }
}

impl Routed for GrepMatch {
    fn path_mut(&mut self) -> &mut String {
        &mut self.path
    }

    fn identity(&self) -> (String, usize) {
        (self.path.clone(), self.line_number)
    }
}

/// How far below the query path a fan-out reaches into route prefixes.
#[derive(Clone, Copy)]
enum Reach {
    /// Routes whose prefix lies under the query directory at a segment
    /// boundary (`/a` reaches `/a/b/` but not `/ab/`).
    Segment,
    /// Routes whose prefix merely starts with the query string.
    Prefix,
}

struct Target<'a> {
    prefix: &'a str,
    backend: &'a dyn BackendProtocol,
    path: String,
}

/// Removes a route prefix, keeping the remainder `/`-rooted.
fn strip_route_prefix(path: &str, prefix: &str) -> String {
    let rest = &path[prefix.len()..];
    if rest.is_empty() {
        "/".to_owned()
    } else if rest.starts_with('/') {
        rest.to_owned()
    } else {
        format!("/{rest}")
    }
}

/// Routes each path to the backend with the longest matching prefix.
///
/// Single-path operations go to exactly one backend. `list`, `grep` and
/// `glob` fan out to every route overlapping the query path plus the default
/// backend, then merge the re-prefixed results. A failing backend does not
/// fail the merged call; use the `*_gathered` methods to observe failures.
#[derive(Clone)]
pub struct CompositeBackend {
    default: Arc<dyn BackendProtocol>,
    routes: Vec<Route>,
}

impl CompositeBackend {
    /// Creates a composite over `default` and `routes`.
    ///
    /// Routes are sorted once by descending prefix length.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidRoute`] when a prefix is empty or not
    /// `/`-rooted.
    pub fn new(
        default: Arc<dyn BackendProtocol>,
        routes: impl IntoIterator<Item = Route>,
    ) -> BackendResult<Self> {
        let mut routes: Vec<Route> = routes.into_iter().collect();
        for route in &routes {
            if route.prefix.is_empty() {
                return Err(BackendError::InvalidRoute("route prefix must not be empty"));
            }
            if !route.prefix.starts_with('/') {
                return Err(BackendError::InvalidRoute("route prefix must start with `/`"));
            }
        }
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        info!(routes = routes.len(), default = default.name(), "composite backend assembled");

        Ok(Self { default, routes })
    }

    /// Returns the routes, most specific first.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the catch-all backend.
    #[must_use]
    pub fn default_backend(&self) -> &Arc<dyn BackendProtocol> {
        &self.default
    }

    fn select(&self, path: &str) -> (&dyn BackendProtocol, String) {
        self.routes
            .iter()
            .find(|route| path.starts_with(route.prefix.as_str()))
            .map_or_else(
                || (self.default.as_ref(), path.to_owned()),
                |route| {
                    (
                        route.backend.as_ref(),
                        strip_route_prefix(path, &route.prefix),
                    )
                },
            )
    }

    fn targets(&self, path: &str, reach: Reach) -> Vec<Target<'_>> {
        let dir = ops::clean_dir(path);
        let mut targets = Vec::with_capacity(self.routes.len() + 1);
        for route in &self.routes {
            let below = match reach {
                Reach::Segment => route.prefix.starts_with(dir.as_str()),
                Reach::Prefix => path.is_empty() || route.prefix.starts_with(path),
            };
            let sub_path = if path.starts_with(route.prefix.as_str()) {
                strip_route_prefix(path, &route.prefix)
            } else if below {
                "/".to_owned()
            } else {
                continue;
            };
            targets.push(Target {
                prefix: &route.prefix,
                backend: route.backend.as_ref(),
                path: sub_path,
            });
        }
        targets.push(Target {
            prefix: "",
            backend: self.default.as_ref(),
            path: path.to_owned(),
        });
        targets
    }

    async fn gather<'a, T, F, Fut>(
        &'a self,
        path: &str,
        reach: Reach,
        operation: &'static str,
        call: F,
    ) -> Gathered<T>
    where
        T: Routed,
        F: Fn(&'a dyn BackendProtocol, String) -> Fut,
        Fut: Future<Output = BackendResult<Vec<T>>>,
    {
        let mut gathered = Gathered::default();
        let mut seen = HashSet::new();

        for target in self.targets(path, reach) {
            match call(target.backend, target.path).await {
                Ok(items) => {
                    let base = target.prefix.trim_end_matches('/');
                    for mut item in items {
                        if !target.prefix.is_empty() {
                            let routed = item.path_mut();
                            routed.insert_str(0, base);
                        }
                        if seen.insert(item.identity()) {
                            gathered.items.push(item);
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        prefix = target.prefix,
                        operation,
                        %error,
                        "backend failed during fan-out; its results are omitted"
                    );
                    gathered.failures.push(RouteFailure {
                        prefix: target.prefix.to_owned(),
                        error,
                    });
                }
            }
        }

        gathered
    }

    /// Lists `path` across all overlapping backends, reporting failures.
    pub async fn list_gathered(&self, path: &str) -> Gathered<EntryInfo> {
        self.gather(path, Reach::Segment, "list", |backend, sub| async move {
            backend.list(&sub).await
        })
        .await
    }

    /// Greps across all overlapping backends, reporting failures.
    pub async fn grep_gathered(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> Gathered<GrepMatch> {
        self.gather(path, Reach::Prefix, "grep", |backend, sub| async move {
            backend.grep(pattern, &sub, glob).await
        })
        .await
    }

    /// Globs across all overlapping backends, reporting failures.
    pub async fn glob_gathered(&self, pattern: &str, path: &str) -> Gathered<EntryInfo> {
        self.gather(path, Reach::Prefix, "glob", |backend, sub| async move {
            backend.glob(pattern, &sub).await
        })
        .await
    }
}

impl fmt::Debug for CompositeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBackend")
            .field("default", &self.default.name())
            .field("routes", &self.routes)
            .finish()
    }
}

impl fmt::Display for CompositeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CompositeBackend {{")?;
        for route in &self.routes {
            writeln!(f, "  {} -> {}", route.prefix, route.backend.name())?;
        }
        writeln!(f, "  default -> {}", self.default.name())?;
        write!(f, "}}")
    }
}

#[async_trait]
impl BackendProtocol for CompositeBackend {
    async fn list(&self, path: &str) -> BackendResult<Vec<EntryInfo>> {
        Ok(self.list_gathered(path).await.items)
    }

    async fn read(&self, path: &str, offset: usize, limit: usize) -> BackendResult<String> {
        let (backend, sub_path) = self.select(path);
        backend.read(&sub_path, offset, limit).await
    }

    async fn write(&self, path: &str, content: &str) -> BackendResult<WriteResult> {
        let (backend, sub_path) = self.select(path);
        backend.write(&sub_path, content).await
    }

    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> BackendResult<EditResult> {
        let (backend, sub_path) = self.select(path);
        backend.edit(&sub_path, old, new, replace_all).await
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> BackendResult<Vec<GrepMatch>> {
        Ok(self.grep_gathered(pattern, path, glob).await.items)
    }

    async fn glob(&self, pattern: &str, path: &str) -> BackendResult<Vec<EntryInfo>> {
        Ok(self.glob_gathered(pattern, path).await.items)
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}
