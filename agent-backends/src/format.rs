//! Presentation helpers for tool layers rendering backend results.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::record::GrepMatch;

/// Warning returned for a file that exists but has only whitespace.
pub const EMPTY_CONTENT_WARNING: &str = "System reminder: File exists but has empty contents";

/// Lines longer than this are split into continuation chunks.
pub const MAX_LINE_LENGTH: usize = 10_000;

/// Width of the right-aligned line number column.
pub const LINE_NUMBER_WIDTH: usize = 6;

/// Default token budget for a single tool result.
pub const TOOL_RESULT_TOKEN_LIMIT: usize = 20_000;

/// Appended to results cut by [`truncate_if_too_long`].
pub const TRUNCATION_GUIDANCE: &str =
    "... [results truncated, try being more specific with your parameters]";

const CHARS_PER_TOKEN: usize = 4;
const DEFAULT_PREVIEW_LINES: usize = 10;

const TEXT_EXTENSIONS: &[&str] = &[
    ".txt", ".md", ".go", ".py", ".js", ".ts", ".jsx", ".tsx", ".json", ".yaml", ".yml",
    ".toml", ".xml", ".html", ".css", ".scss", ".sh", ".bash", ".zsh", ".c", ".cpp", ".h",
    ".hpp", ".java", ".kt", ".rs", ".sql", ".graphql", ".proto", ".dockerfile", ".gitignore",
];

/// Replaces `.`, `/` and `\` so an identifier can be used as a file name.
#[must_use]
pub fn sanitize_tool_call_id(id: &str) -> String {
    id.replace(['.', '/', '\\'], "_")
}

/// Largest index `<= at` that lies on a char boundary of `s`.
fn floor_boundary(s: &str, at: usize) -> usize {
    if at >= s.len() {
        return s.len();
    }
    let mut idx = at;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Renders `content` in `cat -n` style starting at `start_line`.
///
/// A single trailing empty line is dropped. Lines longer than
/// [`MAX_LINE_LENGTH`] bytes are split; continuation chunks are numbered
/// `N.1`, `N.2` and so on.
#[must_use]
pub fn format_content_with_line_numbers(content: &str, start_line: usize) -> String {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.into_iter().enumerate() {
        let number = idx + start_line;
        if line.len() <= MAX_LINE_LENGTH {
            out.push(format!("{number:>width$}\t{line}", width = LINE_NUMBER_WIDTH));
            continue;
        }

        let mut rest = line;
        let mut chunk_idx = 0;
        while !rest.is_empty() {
            let (chunk, tail) = rest.split_at(floor_boundary(rest, MAX_LINE_LENGTH));
            if chunk_idx == 0 {
                out.push(format!("{number:>width$}\t{chunk}", width = LINE_NUMBER_WIDTH));
            } else {
                let marker = format!("{number}.{chunk_idx}");
                out.push(format!("{marker:>width$}\t{chunk}", width = LINE_NUMBER_WIDTH));
            }
            rest = tail;
            chunk_idx += 1;
        }
    }
    out.join("\n")
}

/// Returns [`EMPTY_CONTENT_WARNING`] when `content` is blank.
#[must_use]
pub fn check_empty_content(content: &str) -> Option<&'static str> {
    content.trim().is_empty().then_some(EMPTY_CONTENT_WARNING)
}

/// Cuts `result` to roughly `token_limit` tokens, appending guidance.
///
/// A zero limit selects [`TOOL_RESULT_TOKEN_LIMIT`].
#[must_use]
pub fn truncate_if_too_long(result: &str, token_limit: usize) -> String {
    let limit = if token_limit == 0 {
        TOOL_RESULT_TOKEN_LIMIT
    } else {
        token_limit
    };
    let char_limit = limit.saturating_mul(CHARS_PER_TOKEN);
    if result.len() <= char_limit {
        return result.to_owned();
    }
    let cut = floor_boundary(result, char_limit);
    format!("{}\n{TRUNCATION_GUIDANCE}", &result[..cut])
}

/// Numbers the first `num_lines` lines of `content` (zero means ten).
#[must_use]
pub fn extract_preview(content: &str, num_lines: usize) -> String {
    let num_lines = if num_lines == 0 {
        DEFAULT_PREVIEW_LINES
    } else {
        num_lines
    };
    let head: Vec<&str> = content.split('\n').take(num_lines).collect();
    format_content_with_line_numbers(&head.join("\n"), 1)
}

/// Trims, roots at `/`, collapses `//` and drops a trailing `/` except on root.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.push('/');
    for ch in trimmed.chars() {
        if ch == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(ch);
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Joins `rel` onto `base` and normalizes the result.
#[must_use]
pub fn join_path(base: &str, rel: &str) -> String {
    let base = normalize_path(base);
    let rel = rel.strip_prefix('/').unwrap_or(rel);
    if rel.is_empty() {
        base
    } else if base == "/" {
        normalize_path(rel)
    } else {
        normalize_path(&format!("{base}/{rel}"))
    }
}

/// Formats a byte count as `512 B`, `1.5 KB`, `2.0 MB` and so on.
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < UNITS.len() - 1 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    #[allow(clippy::cast_precision_loss)]
    let scaled = bytes as f64 / div as f64;
    format!("{scaled:.1} {}", UNITS[exp])
}

/// Returns `true` for common text and source file extensions.
#[must_use]
pub fn is_text_file(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    TEXT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Shape of the text produced by [`format_grep_results`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrepOutputMode {
    /// One matching path per line.
    FilesWithMatches,
    /// `path:line:text` for every match.
    #[default]
    Content,
    /// `path: N matches` per file.
    Count,
}

/// Renders grep matches; paths appear in first-seen order.
#[must_use]
pub fn format_grep_results(matches: &[GrepMatch], mode: GrepOutputMode) -> String {
    if matches.is_empty() {
        return "(no matches)".to_owned();
    }

    match mode {
        GrepOutputMode::Content => matches
            .iter()
            .map(|m| format!("{}:{}:{}", m.path, m.line_number, m.line))
            .collect::<Vec<_>>()
            .join("\n"),
        GrepOutputMode::FilesWithMatches => {
            let (order, _) = tally(matches);
            order.join("\n")
        }
        GrepOutputMode::Count => {
            let (order, counts) = tally(matches);
            let mut out = String::new();
            for (idx, path) in order.iter().enumerate() {
                if idx > 0 {
                    out.push('\n');
                }
                let _ = write!(out, "{path}: {} matches", counts[path]);
            }
            out
        }
    }
}

fn tally(matches: &[GrepMatch]) -> (Vec<&str>, HashMap<&str, usize>) {
    let mut order = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in matches {
        let count = counts.entry(m.path.as_str()).or_insert_with(|| {
            order.push(m.path.as_str());
            0
        });
        *count += 1;
    }
    (order, counts)
}

/// Groups matches by file path.
#[must_use]
pub fn group_grep_matches(matches: &[GrepMatch]) -> BTreeMap<String, Vec<GrepMatch>> {
    let mut grouped: BTreeMap<String, Vec<GrepMatch>> = BTreeMap::new();
    for m in matches {
        grouped.entry(m.path.clone()).or_default().push(m.clone());
    }
    grouped
}
