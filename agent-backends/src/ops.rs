//! Operation helpers shared by the record-oriented backends.

use std::collections::HashSet;

use regex::Regex;

use crate::record::{EntryInfo, FileMeta};

/// Domain error reported when an edit is asked to replace an empty string.
pub(crate) const EMPTY_OLD_STRING: &str = "old string must not be empty";

/// Normalizes a directory query to the `/a/b/` form (root stays `/`).
///
/// `.` segments and repeated separators are dropped and `..` pops a segment
/// without climbing above the root.
pub(crate) fn clean_dir(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}/", segments.join("/"))
    }
}

/// Lists the direct children of `path`, synthesizing directory entries for
/// any segment that is a strict ancestor of a stored file.
pub(crate) fn list_children<'a, I>(path: &str, files: I) -> Vec<EntryInfo>
where
    I: IntoIterator<Item = (&'a str, FileMeta)>,
{
    let dir = clean_dir(path);
    let at_root = dir == "/";
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (file_path, meta) in files {
        let relative = if at_root {
            file_path
        } else if let Some(rest) = file_path.strip_prefix(dir.as_str()) {
            rest
        } else {
            continue;
        };

        let mut parts = relative.trim_matches('/').split('/');
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            continue;
        }

        let full_path = format!("{dir}{name}");
        if !seen.insert(full_path.clone()) {
            continue;
        }

        if parts.next().is_some() {
            entries.push(EntryInfo::directory(full_path));
        } else {
            entries.push(meta.entry(file_path));
        }
    }

    entries
}

/// Returns `true` when `file_path` lies under the search root `dir` and the
/// glob regex matches either its path relative to `dir` or the full path.
pub(crate) fn glob_matches(re: &Regex, file_path: &str, dir: &str) -> bool {
    if dir != "/" && !file_path.starts_with(dir) {
        return false;
    }
    let relative = file_path.strip_prefix(dir).unwrap_or(file_path);
    re.is_match(relative) || re.is_match(file_path)
}

/// Selects `limit` lines starting at the 0-based `offset`; a zero `limit`
/// means every remaining line.
pub(crate) fn read_window(lines: &[String], offset: usize, limit: usize) -> String {
    if offset >= lines.len() {
        return String::new();
    }
    let end = if limit == 0 {
        lines.len()
    } else {
        offset.saturating_add(limit).min(lines.len())
    };
    lines[offset..end].join("\n")
}

/// Performs an exact substring replacement, returning the new content and
/// the number of replacements made.
pub(crate) fn replace_text(
    content: &str,
    old: &str,
    new: &str,
    replace_all: bool,
) -> (String, usize) {
    if replace_all {
        let count = content.matches(old).count();
        (content.replace(old, new), count)
    } else if content.contains(old) {
        (content.replacen(old, new, 1), 1)
    } else {
        (content.to_owned(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn meta(size: u64) -> FileMeta {
        FileMeta {
            size,
            created_at: SystemTime::UNIX_EPOCH,
            modified_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn clean_dir_normalizes() {
        assert_eq!(clean_dir(""), "/");
        assert_eq!(clean_dir("/"), "/");
        assert_eq!(clean_dir("/a//b/./"), "/a/b/");
        assert_eq!(clean_dir("a/b/../c"), "/a/c/");
        assert_eq!(clean_dir("/../.."), "/");
    }

    #[test]
    fn lists_direct_children_and_synthesizes_directories() {
        let files = [
            ("/a/b.txt", meta(3)),
            ("/a/c/d.txt", meta(4)),
            ("/a/c/e.txt", meta(5)),
            ("/z.txt", meta(1)),
        ];
        let entries = list_children("/a", files.iter().map(|(p, m)| (*p, *m)));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "/a/b.txt");
        assert!(!entries[0].is_directory);
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[1].path, "/a/c");
        assert!(entries[1].is_directory);
        assert_eq!(entries[1].size, 0);
        assert_eq!(entries[1].modified_time, SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn missing_branch_lists_nothing() {
        let files = [("/a/b.txt", meta(3))];
        assert!(list_children("/nope", files.iter().map(|(p, m)| (*p, *m))).is_empty());
    }

    #[test]
    fn read_window_bounds() {
        let lines: Vec<String> = ["l1", "l2", "l3"].map(String::from).to_vec();
        assert_eq!(read_window(&lines, 0, 0), "l1\nl2\nl3");
        assert_eq!(read_window(&lines, 1, 1), "l2");
        assert_eq!(read_window(&lines, 1, 0), "l2\nl3");
        assert_eq!(read_window(&lines, 2, 10), "l3");
        assert_eq!(read_window(&lines, 3, 0), "");
        assert_eq!(read_window(&lines, 1, usize::MAX), "l2\nl3");
    }

    #[test]
    fn replace_first_or_all() {
        assert_eq!(replace_text("a a a", "a", "b", false), ("b a a".into(), 1));
        assert_eq!(replace_text("a a a", "a", "b", true), ("b b b".into(), 3));
        assert_eq!(replace_text("a a a", "x", "b", true), ("a a a".into(), 0));
        assert_eq!(replace_text("a a a", "x", "b", false), ("a a a".into(), 0));
    }
}
