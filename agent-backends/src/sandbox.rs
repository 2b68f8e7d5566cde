//! Local-disk [`SandboxFs`] confined to a root directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use walkdir::WalkDir;

use crate::filesystem::{SandboxEntry, SandboxFs, SandboxStat};
use crate::pattern;
use crate::{BackendError, BackendResult};

/// Sandbox over a real directory.
///
/// Virtual paths are resolved relative to `root`. Escapes are rejected twice:
/// lexically (a `..` climbing above the root) and after canonicalization
/// (a symlink pointing outside the root).
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Creates a sandbox rooted at `root`.
    ///
    /// The root is canonicalized at construction time so later containment
    /// checks compare like with like (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Splits a virtual path into normal segments, rejecting `..` escapes.
    fn segments(path: &str) -> BackendResult<Vec<&str>> {
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(BackendError::PathEscapesSandbox(path.to_owned()));
                    }
                }
                other => segments.push(other),
            }
        }
        Ok(segments)
    }

    fn virtual_path(&self, real: &Path) -> Option<String> {
        let relative = real.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for component in relative.components() {
            out.push('/');
            out.push_str(&component.as_os_str().to_string_lossy());
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }

    async fn check_contained(&self, path: &str, full: &Path) -> BackendResult<()> {
        // Canonicalize the deepest existing ancestor; missing tails cannot
        // be symlinks yet.
        let mut probe = full.to_path_buf();
        loop {
            match fs::canonicalize(&probe).await {
                Ok(canonical) => {
                    return if canonical.starts_with(&self.root) {
                        Ok(())
                    } else {
                        Err(BackendError::PathEscapesSandbox(path.to_owned()))
                    };
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    if !probe.pop() || !probe.starts_with(&self.root) {
                        return Ok(());
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Collects every path below `base` without following symlinks; a
    /// missing `base` yields nothing.
    async fn walk(base: PathBuf) -> BackendResult<Vec<PathBuf>> {
        tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for entry in WalkDir::new(&base).min_depth(1).follow_links(false) {
                match entry {
                    Ok(entry) => found.push(entry.into_path()),
                    Err(err)
                        if err
                            .io_error()
                            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound) => {}
                    Err(err) => return Err(BackendError::from(std::io::Error::from(err))),
                }
            }
            Ok(found)
        })
        .await
        .map_err(|err| BackendError::from(std::io::Error::other(err)))?
    }

    fn not_found(path: &str, err: std::io::Error) -> BackendError {
        if err.kind() == std::io::ErrorKind::NotFound {
            BackendError::not_found(path)
        } else {
            err.into()
        }
    }
}

fn stat_from(meta: &std::fs::Metadata) -> SandboxStat {
    SandboxStat {
        is_dir: meta.is_dir(),
        size: meta.len(),
        modified: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        created: meta.created().ok(),
    }
}

#[async_trait]
impl SandboxFs for LocalSandbox {
    async fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let mut full = self.root.clone();
        full.extend(Self::segments(path)?);
        self.check_contained(path, &full).await?;
        Ok(full)
    }

    async fn read(&self, path: &str) -> BackendResult<String> {
        let real = self.resolve(path).await?;
        fs::read_to_string(&real)
            .await
            .map_err(|err| Self::not_found(path, err))
    }

    async fn write(&self, path: &str, content: &str) -> BackendResult<()> {
        let real = self.resolve(path).await?;
        if let Some(parent) = real.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&real, content).await?;
        Ok(())
    }

    async fn stat(&self, path: &str) -> BackendResult<SandboxStat> {
        let real = self.resolve(path).await?;
        let meta = fs::metadata(&real)
            .await
            .map_err(|err| Self::not_found(path, err))?;
        Ok(stat_from(&meta))
    }

    async fn list_dir(&self, path: &str) -> BackendResult<Vec<SandboxEntry>> {
        let real = self.resolve(path).await?;
        let mut reader = fs::read_dir(&real)
            .await
            .map_err(|err| Self::not_found(path, err))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let meta = entry.metadata().await?;
            entries.push(SandboxEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                stat: stat_from(&meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn glob(&self, pattern: &str) -> BackendResult<Vec<String>> {
        let absolute = format!("/{}", pattern.trim_start_matches('/'));
        let re = pattern::compile_anchored_glob(&absolute)?;

        // Walk only from the longest wildcard-free directory prefix.
        let segments: Vec<&str> = absolute.split('/').filter(|s| !s.is_empty()).collect();
        let fixed = segments
            .iter()
            .take(segments.len().saturating_sub(1))
            .take_while(|s| !s.contains(['*', '?']))
            .copied()
            .collect::<Vec<_>>()
            .join("/");
        let base = self.resolve(&fixed).await?;

        let mut matches: Vec<String> = Self::walk(base)
            .await?
            .iter()
            .filter_map(|real| self.virtual_path(real))
            .filter(|virt| re.is_match(virt))
            .collect();
        matches.sort();
        Ok(matches)
    }
}
