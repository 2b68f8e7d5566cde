//! Ephemeral, session-scoped backend holding records in memory.

use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::ops::{self, EMPTY_OLD_STRING};
use crate::pattern;
use crate::protocol::BackendProtocol;
use crate::record::{EditResult, EntryInfo, FileRecord, GrepMatch, WriteResult};
use crate::{BackendError, BackendResult};

/// In-memory backend whose lifetime matches one agent session.
///
/// Reads share the lock, writes and edits take it exclusively for the whole
/// call. Snapshots taken with [`files`](Self::files) can be persisted by the
/// caller and restored with [`load_files`](Self::load_files).
#[derive(Debug, Default)]
pub struct StateBackend {
    files: RwLock<BTreeMap<String, FileRecord>>,
}

impl StateBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored record keyed by path.
    pub async fn files(&self) -> HashMap<String, FileRecord> {
        let guard = self.files.read().await;
        guard
            .iter()
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect()
    }

    /// Replaces the stored records with `files`.
    pub async fn load_files(&self, files: HashMap<String, FileRecord>) {
        let mut guard = self.files.write().await;
        *guard = files.into_iter().collect();
        debug!(files = guard.len(), "state backend restored");
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Returns `true` when no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl BackendProtocol for StateBackend {
    async fn list(&self, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let guard = self.files.read().await;
        Ok(ops::list_children(
            path,
            guard.iter().map(|(p, record)| (p.as_str(), record.meta())),
        ))
    }

    async fn read(&self, path: &str, offset: usize, limit: usize) -> BackendResult<String> {
        let guard = self.files.read().await;
        let record = guard.get(path).ok_or_else(|| BackendError::not_found(path))?;
        Ok(ops::read_window(record.lines(), offset, limit))
    }

    async fn write(&self, path: &str, content: &str) -> BackendResult<WriteResult> {
        let mut guard = self.files.write().await;
        let now = SystemTime::now();
        let record = match guard.get(path) {
            Some(existing) => existing.overwritten(content, now),
            None => FileRecord::from_content(content, now),
        };
        guard.insert(path.to_owned(), record.clone());
        debug!(path, bytes = content.len(), "state backend write");

        Ok(WriteResult::success(path, content.len() as u64)
            .with_files_update(HashMap::from([(path.to_owned(), record)])))
    }

    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> BackendResult<EditResult> {
        if old.is_empty() {
            return Ok(EditResult::failure(path, EMPTY_OLD_STRING));
        }

        let mut guard = self.files.write().await;
        let Some(record) = guard.get_mut(path) else {
            return Ok(EditResult::failure(path, format!("file not found: {path}")));
        };

        let (content, replacements) =
            ops::replace_text(&record.content(), old, new, replace_all);
        debug!(path, replacements, "state backend edit");
        if replacements == 0 {
            return Ok(EditResult::success(path, 0));
        }

        record.replace_content(&content, SystemTime::now());
        let update = HashMap::from([(path.to_owned(), record.clone())]);
        Ok(EditResult::success(path, replacements).with_files_update(update))
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> BackendResult<Vec<GrepMatch>> {
        let re = pattern::compile_grep(pattern)?;
        let filter = pattern::compile_name_filter(glob)?;

        let guard = self.files.read().await;
        let mut matches = Vec::new();
        for (file_path, record) in guard.iter() {
            if !file_path.starts_with(path) || !pattern::name_matches(filter.as_ref(), file_path) {
                continue;
            }
            matches.extend(pattern::grep_lines(
                &re,
                file_path,
                record.lines().iter().map(String::as_str),
            ));
        }
        Ok(matches)
    }

    async fn glob(&self, pattern: &str, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let dir = if path.is_empty() { "/" } else { path };
        let re = pattern::compile_glob(pattern)?;

        let guard = self.files.read().await;
        let mut entries = Vec::new();
        for (file_path, record) in guard.iter() {
            if ops::glob_matches(&re, file_path, dir) {
                entries.push(record.entry(file_path.as_str()));
            }
        }
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "state"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let backend = StateBackend::new();
        let content = "first\nsecond\n\nfourth\n";
        let result = backend.write("/notes/a.md", content).await.unwrap();
        assert!(result.is_ok());
        assert_eq!(result.bytes_written, content.len() as u64);
        assert_eq!(backend.read("/notes/a.md", 0, 0).await.unwrap(), content);
    }

    #[tokio::test]
    async fn read_window_and_edit_scenario() {
        let backend = StateBackend::new();
        backend.write("/a/b.txt", "l1\nl2\nl3").await.unwrap();

        assert_eq!(backend.read("/a/b.txt", 1, 1).await.unwrap(), "l2");
        assert_eq!(backend.read("/a/b.txt", 3, 0).await.unwrap(), "");
        assert_eq!(backend.read("/a/b.txt", 1, 0).await.unwrap(), "l2\nl3");

        let edit = backend.edit("/a/b.txt", "l2", "L2", false).await.unwrap();
        assert!(edit.is_ok());
        assert_eq!(edit.replacements_made, 1);
        assert!(backend.read("/a/b.txt", 0, 0).await.unwrap().contains("L2"));
    }

    #[tokio::test]
    async fn read_missing_path_errors() {
        let backend = StateBackend::new();
        let err = backend.read("/missing", 0, 0).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn overwrite_preserves_created_at() {
        let backend = StateBackend::new();
        backend.write("/f.txt", "one").await.unwrap();
        let created = backend.files().await["/f.txt"].created_at();

        let result = backend.write("/f.txt", "two").await.unwrap();
        let update = result.files_update.unwrap();
        assert_eq!(update["/f.txt"].created_at(), created);
        assert!(update["/f.txt"].modified_at() >= created);
        assert_eq!(backend.read("/f.txt", 0, 0).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn edit_counts_and_missing_targets() {
        let backend = StateBackend::new();
        backend.write("/f.txt", "foo bar foo\nfoo").await.unwrap();

        let all = backend.edit("/f.txt", "foo", "baz", true).await.unwrap();
        assert_eq!(all.replacements_made, 3);
        assert!(all.files_update.is_some());
        assert_eq!(
            backend.read("/f.txt", 0, 0).await.unwrap(),
            "baz bar baz\nbaz"
        );

        let noop = backend.edit("/f.txt", "absent", "x", false).await.unwrap();
        assert!(noop.is_ok());
        assert_eq!(noop.replacements_made, 0);
        assert!(noop.files_update.is_none());

        let missing = backend.edit("/nope.txt", "a", "b", false).await.unwrap();
        assert_eq!(missing.error.as_deref(), Some("file not found: /nope.txt"));

        let empty = backend.edit("/f.txt", "", "b", true).await.unwrap();
        assert!(!empty.is_ok());
    }

    #[tokio::test]
    async fn grep_reports_one_based_lines() {
        let backend = StateBackend::new();
        backend.write("/one.txt", "l1\nl2").await.unwrap();
        backend.write("/two.txt", "l2\nl3").await.unwrap();

        let matches = backend.grep("l2", "/", None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, "/one.txt");
        assert_eq!(matches[0].line_number, 2);
        assert_eq!(matches[1].path, "/two.txt");
        assert_eq!(matches[1].line_number, 1);
        assert_eq!(matches[1].matched, "l2");
    }

    #[tokio::test]
    async fn grep_glob_filters_on_base_name() {
        let backend = StateBackend::new();
        backend.write("/src/main.go", "TODO: go").await.unwrap();
        backend.write("/docs/todo.md", "TODO: docs").await.unwrap();

        let matches = backend.grep("TODO", "/", Some("*.go")).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "/src/main.go");

        let scoped = backend.grep("TODO", "/docs", None).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].path, "/docs/todo.md");
    }

    #[tokio::test]
    async fn grep_rejects_invalid_regex() {
        let backend = StateBackend::new();
        backend.write("/a.txt", "x").await.unwrap();
        let err = backend.grep("[", "/", None).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn glob_is_unanchored() {
        let backend = StateBackend::new();
        backend.write("/src/main.go", "").await.unwrap();
        backend.write("/src/foo.go.bak", "").await.unwrap();
        backend.write("/src/lib.rs", "").await.unwrap();

        let paths: Vec<_> = backend
            .glob("*.go", "/src/")
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        assert_eq!(paths, ["/src/foo.go.bak", "/src/main.go"]);
    }

    #[tokio::test]
    async fn list_synthesizes_directories() {
        let backend = StateBackend::new();
        backend.write("/a/b.txt", "hi").await.unwrap();
        backend.write("/a/c/d.txt", "deep").await.unwrap();

        let root = backend.list("/").await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].path, "/a");
        assert!(root[0].is_directory);

        let nested = backend.list("/a/").await.unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].path, "/a/b.txt");
        assert_eq!(nested[0].size, 3);
        assert_eq!(nested[1].path, "/a/c");

        assert!(backend.list("/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_restores_into_fresh_backend() {
        let original = StateBackend::new();
        original.write("/x.txt", "alpha\nbeta").await.unwrap();
        original.write("/dir/y.txt", "gamma").await.unwrap();

        let restored = StateBackend::new();
        restored.load_files(original.files().await).await;

        assert_eq!(restored.len().await, 2);
        for path in ["/x.txt", "/dir/y.txt"] {
            assert_eq!(
                restored.read(path, 0, 0).await.unwrap(),
                original.read(path, 0, 0).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn snapshot_survives_json() {
        let original = StateBackend::new();
        original.write("/x.txt", "alpha").await.unwrap();
        let json = serde_json::to_string(&original.files().await).unwrap();

        let restored = StateBackend::new();
        restored
            .load_files(serde_json::from_str(&json).unwrap())
            .await;
        assert_eq!(restored.read("/x.txt", 0, 0).await.unwrap(), "alpha");
    }
}
