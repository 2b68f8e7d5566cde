//! Glob and grep helpers shared by every backend.

use regex::Regex;

use crate::record::GrepMatch;
use crate::{BackendError, BackendResult};

/// Converts a glob into an unanchored regular expression.
///
/// `**` becomes `.*` and is rewritten before `*` becomes `[^/]*`; `?` matches
/// any single character. The result is not anchored, so `*.go` also matches
/// `foo.go.bak`. Callers that need whole-path semantics use
/// [`glob_to_anchored_regex`].
#[must_use]
pub fn glob_to_regex(glob: &str) -> String {
    regex::escape(glob)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".")
}

/// Converts a glob into a regular expression matching whole paths.
///
/// A `**/` segment may match zero or more directories, so `/src/**/*.rs`
/// matches `/src/lib.rs` as well as `/src/a/b/lib.rs`.
#[must_use]
pub fn glob_to_anchored_regex(glob: &str) -> String {
    let body = regex::escape(glob)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    format!("^{body}$")
}

/// Compiles a glob with the permissive, unanchored semantics.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPattern`] when the derived regex is invalid.
pub fn compile_glob(glob: &str) -> BackendResult<Regex> {
    compile(glob, &glob_to_regex(glob))
}

/// Compiles a glob that must match an entire path.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPattern`] when the derived regex is invalid.
pub fn compile_anchored_glob(glob: &str) -> BackendResult<Regex> {
    compile(glob, &glob_to_anchored_regex(glob))
}

/// Compiles a user-supplied grep pattern as a regular expression.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPattern`] when the pattern is invalid.
pub fn compile_grep(pattern: &str) -> BackendResult<Regex> {
    compile(pattern, pattern)
}

/// Compiles the optional file-name filter accepted by grep.
///
/// # Errors
///
/// Returns [`BackendError::InvalidPattern`] when the glob is invalid.
pub fn compile_name_filter(glob: Option<&str>) -> BackendResult<Option<Regex>> {
    glob.filter(|g| !g.is_empty()).map(compile_glob).transpose()
}

fn compile(original: &str, source: &str) -> BackendResult<Regex> {
    Regex::new(source).map_err(|err| BackendError::InvalidPattern {
        pattern: original.to_owned(),
        source: err,
    })
}

/// Returns the final segment of a `/`-separated path.
#[must_use]
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Returns `true` when the file passes the optional base-name filter.
#[must_use]
pub fn name_matches(filter: Option<&Regex>, path: &str) -> bool {
    filter.is_none_or(|re| re.is_match(base_name(path)))
}

/// Scans `lines`, reporting the first match of `re` on each matching line.
pub fn grep_lines<'a, I>(re: &Regex, path: &str, lines: I) -> Vec<GrepMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            re.find(line).map(|found| GrepMatch {
                path: path.to_owned(),
                line_number: idx + 1,
                line: line.to_owned(),
                matched: found.as_str().to_owned(),
            })
        })
        .collect()
}
