//! Shared record types for the backend subsystem.

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Line-oriented representation of one stored file.
///
/// Content is split on `\n` and kept as lines; the size is derived rather than
/// stored. `created_at` survives overwrites of the same path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    lines: Vec<String>,
    created_at: SystemTime,
    modified_at: SystemTime,
}

impl FileRecord {
    /// Creates a record from explicit parts.
    #[must_use]
    pub fn new(lines: Vec<String>, created_at: SystemTime, modified_at: SystemTime) -> Self {
        Self {
            lines,
            created_at,
            modified_at,
        }
    }

    /// Creates a fresh record whose creation and modification times are `now`.
    #[must_use]
    pub fn from_content(content: &str, now: SystemTime) -> Self {
        Self::new(split_lines(content), now, now)
    }

    /// Produces the record that replaces `self` when `content` is written over it.
    #[must_use]
    pub fn overwritten(&self, content: &str, now: SystemTime) -> Self {
        Self::new(split_lines(content), self.created_at, now)
    }

    /// Returns the stored lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Re-joins the stored lines with `\n`.
    #[must_use]
    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub fn modified_at(&self) -> SystemTime {
        self.modified_at
    }

    /// Size in bytes, counting one terminator per line.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.lines.iter().map(|line| line.len() as u64 + 1).sum()
    }

    /// Returns the index metadata describing this record.
    #[must_use]
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            size: self.size(),
            created_at: self.created_at,
            modified_at: self.modified_at,
        }
    }

    /// Returns the file projection of this record at `path`.
    #[must_use]
    pub fn entry(&self, path: impl Into<String>) -> EntryInfo {
        self.meta().entry(path)
    }

    pub(crate) fn replace_content(&mut self, content: &str, now: SystemTime) {
        self.lines = split_lines(content);
        self.modified_at = now;
    }
}

fn split_lines(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_owned).collect()
}

/// Metadata kept for each path in a persistent index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Derived size in bytes.
    pub size: u64,
    /// Creation timestamp of the record.
    pub created_at: SystemTime,
    /// Last modification timestamp of the record.
    pub modified_at: SystemTime,
}

impl FileMeta {
    /// Returns the file projection of this metadata at `path`.
    #[must_use]
    pub fn entry(&self, path: impl Into<String>) -> EntryInfo {
        EntryInfo {
            path: path.into(),
            is_directory: false,
            size: self.size,
            modified_time: self.modified_at,
            created_time: self.created_at,
        }
    }
}

/// Read projection of a file or synthesized directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Absolute, `/`-rooted path.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes; zero for directories.
    pub size: u64,
    /// Last modification time; the Unix epoch for synthesized directories.
    pub modified_time: SystemTime,
    /// Creation time; the Unix epoch for synthesized directories.
    pub created_time: SystemTime,
}

impl EntryInfo {
    /// Creates a synthesized directory entry.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            size: 0,
            modified_time: SystemTime::UNIX_EPOCH,
            created_time: SystemTime::UNIX_EPOCH,
        }
    }
}

/// A single line matched by a grep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    /// Path of the file containing the line.
    pub path: String,
    /// 1-based line number.
    pub line_number: usize,
    /// Full text of the matching line.
    pub line: String,
    /// First substring of the line matched by the pattern.
    #[serde(rename = "match")]
    pub matched: String,
}

/// Outcome of a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Domain-level failure; `None` means success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Path that was written.
    pub path: String,
    /// Number of content bytes written.
    #[serde(default)]
    pub bytes_written: u64,
    /// Changed records, reported only by the in-memory state backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_update: Option<HashMap<String, FileRecord>>,
}

impl WriteResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(path: impl Into<String>, bytes_written: u64) -> Self {
        Self {
            error: None,
            path: path.into(),
            bytes_written,
            files_update: None,
        }
    }

    /// Creates a failed result carrying a domain error.
    #[must_use]
    pub fn failure(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            path: path.into(),
            bytes_written: 0,
            files_update: None,
        }
    }

    /// Attaches the records changed by this write.
    #[must_use]
    pub fn with_files_update(mut self, update: HashMap<String, FileRecord>) -> Self {
        self.files_update = Some(update);
        self
    }

    /// Returns `true` when no domain error was reported.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of an edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditResult {
    /// Domain-level failure; `None` means success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Path that was edited.
    pub path: String,
    /// Number of replacements performed. Zero means the edit was a no-op.
    #[serde(default)]
    pub replacements_made: usize,
    /// Changed records, reported only by the in-memory state backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_update: Option<HashMap<String, FileRecord>>,
}

impl EditResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(path: impl Into<String>, replacements_made: usize) -> Self {
        Self {
            error: None,
            path: path.into(),
            replacements_made,
            files_update: None,
        }
    }

    /// Creates a failed result carrying a domain error.
    #[must_use]
    pub fn failure(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            path: path.into(),
            replacements_made: 0,
            files_update: None,
        }
    }

    /// Attaches the records changed by this edit.
    #[must_use]
    pub fn with_files_update(mut self, update: HashMap<String, FileRecord>) -> Self {
        self.files_update = Some(update);
        self
    }

    /// Returns `true` when no domain error was reported.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn size_counts_line_terminators() {
        let record = FileRecord::from_content("ab\ncde", SystemTime::now());
        assert_eq!(record.lines(), ["ab", "cde"]);
        assert_eq!(record.size(), 7);

        let empty = FileRecord::from_content("", SystemTime::now());
        assert_eq!(empty.lines(), [""]);
        assert_eq!(empty.size(), 1);
    }

    #[test]
    fn overwrite_preserves_creation_time() {
        let created = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let later = created + Duration::from_secs(5);
        let record = FileRecord::from_content("one", created);
        let replaced = record.overwritten("two\nthree", later);

        assert_eq!(replaced.created_at(), created);
        assert_eq!(replaced.modified_at(), later);
        assert_eq!(replaced.content(), "two\nthree");
    }

    #[test]
    fn grep_match_serializes_match_field() {
        let value = serde_json::to_value(GrepMatch {
            path: "/a.txt".into(),
            line_number: 2,
            line: "hello world".into(),
            matched: "world".into(),
        })
        .unwrap();
        assert_eq!(value["match"], "world");
        assert_eq!(value["line_number"], 2);
    }

    #[test]
    fn successful_results_omit_error() {
        let value = serde_json::to_value(WriteResult::success("/a", 3)).unwrap();
        assert!(value.get("error").is_none());
        assert!(EditResult::failure("/a", "file not found: /a").error.is_some());
    }
}
