//! Backend adapting a sandboxed real filesystem to the storage protocol.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::debug;

use crate::ops::{self, EMPTY_OLD_STRING};
use crate::pattern;
use crate::protocol::BackendProtocol;
use crate::record::{EditResult, EntryInfo, GrepMatch, WriteResult};
use crate::{BackendError, BackendResult};

/// Metadata reported by a [`SandboxFs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxStat {
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Creation time, when the platform reports one.
    pub created: Option<SystemTime>,
}

impl SandboxStat {
    fn entry(&self, path: String) -> EntryInfo {
        EntryInfo {
            path,
            is_directory: self.is_dir,
            size: self.size,
            modified_time: self.modified,
            created_time: self.created.unwrap_or(self.modified),
        }
    }
}

/// A named child returned by [`SandboxFs::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxEntry {
    /// File name of the child.
    pub name: String,
    /// Metadata of the child.
    pub stat: SandboxStat,
}

/// Filesystem accessor responsible for path containment.
///
/// Paths are virtual, `/`-rooted and relative to the sandbox root.
/// Implementations must reject any path resolving outside that root.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    /// Resolves a virtual path to a real path inside the sandbox.
    async fn resolve(&self, path: &str) -> BackendResult<PathBuf>;

    /// Reads a whole file as UTF-8 text.
    async fn read(&self, path: &str) -> BackendResult<String>;

    /// Writes a whole file, creating parent directories as needed.
    async fn write(&self, path: &str, content: &str) -> BackendResult<()>;

    /// Returns metadata for a path.
    async fn stat(&self, path: &str) -> BackendResult<SandboxStat>;

    /// Lists the direct children of a directory.
    async fn list_dir(&self, path: &str) -> BackendResult<Vec<SandboxEntry>>;

    /// Returns the virtual paths of files and directories matching an
    /// absolute glob such as `/src/**/*.rs`.
    async fn glob(&self, pattern: &str) -> BackendResult<Vec<String>>;
}

/// Backend over a [`SandboxFs`]. It adds no locking of its own.
#[derive(Clone)]
pub struct FilesystemBackend {
    fs: Arc<dyn SandboxFs>,
}

impl std::fmt::Debug for FilesystemBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemBackend").finish_non_exhaustive()
    }
}

impl FilesystemBackend {
    /// Creates a backend over the supplied sandbox.
    #[must_use]
    pub fn new(fs: Arc<dyn SandboxFs>) -> Self {
        Self { fs }
    }

    /// Resolves a virtual path to the real path it refers to.
    ///
    /// # Errors
    ///
    /// Propagates containment failures reported by the sandbox.
    pub async fn real_path(&self, path: &str) -> BackendResult<PathBuf> {
        self.fs.resolve(path).await
    }
}

fn search_root(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}

/// Missing paths and plain files have no children to list.
fn lists_as_empty(err: &BackendError) -> bool {
    err.is_not_found()
        || matches!(
            err,
            BackendError::Io { source } if source.kind() == std::io::ErrorKind::NotADirectory
        )
}

fn join_virtual(dir: &str, rest: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        rest.trim_start_matches('/')
    )
}

#[async_trait]
impl BackendProtocol for FilesystemBackend {
    async fn list(&self, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let dir = search_root(path);
        let children = match self.fs.list_dir(dir).await {
            Ok(children) => children,
            Err(err) if lists_as_empty(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        Ok(children
            .into_iter()
            .map(|child| child.stat.entry(join_virtual(dir, &child.name)))
            .collect())
    }

    async fn read(&self, path: &str, offset: usize, limit: usize) -> BackendResult<String> {
        let content = self.fs.read(path).await?;
        let lines: Vec<String> = content.split('\n').map(str::to_owned).collect();
        Ok(ops::read_window(&lines, offset, limit))
    }

    async fn write(&self, path: &str, content: &str) -> BackendResult<WriteResult> {
        match self.fs.write(path, content).await {
            Ok(()) => {
                debug!(path, bytes = content.len(), "filesystem backend write");
                Ok(WriteResult::success(path, content.len() as u64))
            }
            Err(err) => Ok(WriteResult::failure(
                path,
                format!("failed to write file: {err}"),
            )),
        }
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

        let content = match self.fs.read(path).await {
            Ok(content) => content,
            Err(err) => {
                return Ok(EditResult::failure(
                    path,
                    format!("failed to read file: {err}"),
                ));
            }
        };

        let (updated, replacements) = ops::replace_text(&content, old, new, replace_all);
        if replacements > 0 {
            if let Err(err) = self.fs.write(path, &updated).await {
                return Ok(EditResult::failure(
                    path,
                    format!("failed to write file: {err}"),
                ));
            }
        }
        debug!(path, replacements, "filesystem backend edit");
        Ok(EditResult::success(path, replacements))
    }

    async fn grep(
        &self,
        pattern: &str,
        path: &str,
        glob: Option<&str>,
    ) -> BackendResult<Vec<GrepMatch>> {
        let re = pattern::compile_grep(pattern)?;
        let filter = pattern::compile_name_filter(glob)?;
        let candidates = self
            .fs
            .glob(&join_virtual(search_root(path), "**/*"))
            .await?;

        let mut matches = Vec::new();
        for file_path in candidates {
            if !pattern::name_matches(filter.as_ref(), &file_path) {
                continue;
            }
            match self.fs.stat(&file_path).await {
                Ok(stat) if !stat.is_dir => {}
                _ => continue,
            }
            // Unreadable or non-UTF-8 files are skipped.
            let Ok(content) = self.fs.read(&file_path).await else {
                continue;
            };
            matches.extend(pattern::grep_lines(&re, &file_path, content.split('\n')));
        }
        Ok(matches)
    }

    async fn glob(&self, pattern: &str, path: &str) -> BackendResult<Vec<EntryInfo>> {
        let paths = self
            .fs
            .glob(&join_virtual(search_root(path), pattern))
            .await?;

        let mut entries = Vec::with_capacity(paths.len());
        for file_path in paths {
            if let Ok(stat) = self.fs.stat(&file_path).await {
                entries.push(stat.entry(file_path));
            }
        }
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::LocalSandbox;
    use tempfile::TempDir;

    fn setup() -> (FilesystemBackend, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(dir.path());
        (FilesystemBackend::new(Arc::new(sandbox)), dir)
    }

    #[tokio::test]
    async fn write_read_and_edit_on_disk() {
        let (backend, dir) = setup();
        let result = backend.write("/a/b.txt", "l1\nl2\nl3").await.unwrap();
        assert!(result.is_ok());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b.txt")).unwrap(),
            "l1\nl2\nl3"
        );

        assert_eq!(backend.read("/a/b.txt", 1, 1).await.unwrap(), "l2");
        assert_eq!(backend.read("/a/b.txt", 9, 0).await.unwrap(), "");

        let edit = backend.edit("/a/b.txt", "l2", "L2", false).await.unwrap();
        assert_eq!(edit.replacements_made, 1);
        assert_eq!(backend.read("/a/b.txt", 0, 0).await.unwrap(), "l1\nL2\nl3");
    }

    #[tokio::test]
    async fn read_missing_file_errors() {
        let (backend, _dir) = setup();
        let err = backend.read("/nope.txt", 0, 0).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn edit_missing_file_is_domain_error() {
        let (backend, _dir) = setup();
        let result = backend.edit("/nope.txt", "a", "b", false).await.unwrap();
        assert!(result
            .error
            .as_deref()
            .is_some_and(|msg| msg.starts_with("failed to read file")));
    }

    #[tokio::test]
    async fn escaping_write_is_domain_error() {
        let (backend, _dir) = setup();
        let result = backend.write("/../outside.txt", "x").await.unwrap();
        assert!(!result.is_ok());
        assert!(matches!(
            backend.real_path("/../../etc/passwd").await,
            Err(BackendError::PathEscapesSandbox(_))
        ));
    }

    #[tokio::test]
    async fn list_reports_files_and_directories() {
        let (backend, _dir) = setup();
        backend.write("/src/main.rs", "fn main() {}").await.unwrap();
        backend.write("/README.md", "hi").await.unwrap();

        let root = backend.list("/").await.unwrap();
        let paths: Vec<_> = root.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/README.md", "/src"]);
        assert!(!root[0].is_directory);
        assert_eq!(root[0].size, 2);
        assert!(root[1].is_directory);

        assert!(backend.list("/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_of_a_file_is_empty() {
        let (backend, _dir) = setup();
        backend.write("/notes.txt", "plain").await.unwrap();
        assert!(backend.list("/notes.txt").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn grep_walks_tree_with_name_filter() {
        let (backend, _dir) = setup();
        backend.write("/src/lib.rs", "// TODO one\nfn x() {}").await.unwrap();
        backend.write("/src/deep/mod.rs", "fn y() {}\n// TODO two").await.unwrap();
        backend.write("/notes.md", "TODO three").await.unwrap();

        let all = backend.grep("TODO", "/", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let rust = backend.grep("TODO \\w+", "/src", Some("*.rs")).await.unwrap();
        assert_eq!(rust.len(), 2);
        assert_eq!(rust[0].path, "/src/deep/mod.rs");
        assert_eq!(rust[0].line_number, 2);
        assert_eq!(rust[0].matched, "TODO two");
        assert_eq!(rust[1].path, "/src/lib.rs");
    }

    #[tokio::test]
    async fn glob_is_anchored_on_disk() {
        let (backend, _dir) = setup();
        backend.write("/src/main.go", "").await.unwrap();
        backend.write("/src/main.go.bak", "").await.unwrap();
        backend.write("/src/pkg/util.go", "").await.unwrap();

        let shallow: Vec<_> = backend
            .glob("*.go", "/src")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(shallow, ["/src/main.go"]);

        let deep: Vec<_> = backend
            .glob("**/*.go", "/")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(deep, ["/src/main.go", "/src/pkg/util.go"]);
    }
}
