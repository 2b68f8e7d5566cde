//! The six-operation contract implemented by every backend.

use async_trait::async_trait;

use crate::BackendResult;
use crate::record::{EditResult, EntryInfo, GrepMatch, WriteResult};

/// Uniform path-addressed storage protocol.
///
/// All paths are absolute and `/`-rooted. Infrastructure failures (invalid
/// patterns, store outages) are returned as errors; domain outcomes of
/// [`write`](Self::write) and [`edit`](Self::edit) travel in the result's
/// `error` field. [`read`](Self::read) is the exception and fails with
/// [`BackendError::NotFound`](crate::BackendError::NotFound) for unknown paths.
#[async_trait]
pub trait BackendProtocol: Send + Sync {
    /// Lists the direct children of `path`.
    ///
    /// A branch with no stored files yields an empty list, not an error.
    async fn list(&self, path: &str) -> BackendResult<Vec<EntryInfo>>;

    /// Reads `limit` lines starting at the 0-based line `offset`.
    ///
    /// A `limit` of zero reads to the end. An `offset` past the last line
    /// yields an empty string.
    async fn read(&self, path: &str, offset: usize, limit: usize) -> BackendResult<String>;

    /// Replaces the record at `path` with `content`.
    async fn write(&self, path: &str, content: &str) -> BackendResult<WriteResult>;

    /// Replaces the first (or every) exact occurrence of `old` with `new`.
    ///
    /// A missing `old` produces a successful result with zero replacements.
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> BackendResult<EditResult>;

    /// Searches file lines under `path` for the regular expression `pattern`,
    /// optionally restricted to files whose base name matches `glob`.
    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> BackendResult<Vec<GrepMatch>>;

    /// Lists files under `path` matching the glob `pattern`.
    async fn glob(&self, pattern: &str, path: &str) -> BackendResult<Vec<EntryInfo>>;

    /// Short label used when describing backend topologies.
    fn name(&self) -> &'static str {
        "backend"
    }
}
