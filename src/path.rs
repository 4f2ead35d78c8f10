//! Path normalisation for repository-relative document paths
//!
//! Every lookup against a manifest, the prefix index or the consistency
//! checker goes through these helpers so that `guide/index.md`,
//! `guide\index.md`, `/guide/` and `Guide` all address the same document.

use crate::error::{Error, Result};
use glob::Pattern;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// The document extension stripped from lookup paths.
const DOCUMENT_EXTENSION: &str = ".md";

/// Match a path against a glob pattern
pub fn glob_match(pattern: &str, path: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(path))
}

/// Replace Windows separators with `/`.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Strip a trailing `.md` extension (ASCII case-insensitive).
pub fn strip_document_extension(path: &str) -> &str {
    let len = path.len();
    let ext = DOCUMENT_EXTENSION.len();
    if len >= ext
        && path.is_char_boundary(len - ext)
        && path[len - ext..].eq_ignore_ascii_case(DOCUMENT_EXTENSION)
    {
        &path[..len - ext]
    } else {
        path
    }
}

/// Convert a repository-relative document path to the path it is published
/// under.
///
/// Separators are normalised, surrounding slashes trimmed, the document
/// extension stripped and an `index` leaf collapsed onto its parent folder:
///
/// - `guide/intro.md` becomes `guide/intro`
/// - `guide/index.md` becomes `guide`
/// - `index.md` becomes the empty string
pub fn to_target_path(path: &str) -> String {
    let normalized = normalize_separators(path);
    let trimmed = strip_document_extension(normalized.trim_matches('/')).trim_end_matches('/');

    if trimmed.eq_ignore_ascii_case("index") {
        return String::new();
    }

    let len = trimmed.len();
    if len > "/index".len()
        && trimmed.is_char_boundary(len - "/index".len())
        && trimmed[len - "/index".len()..].eq_ignore_ascii_case("/index")
    {
        return trimmed[..len - "/index".len()]
            .trim_end_matches('/')
            .to_string();
    }

    trimmed.to_string()
}

/// Join the host and path components of a `scheme://host/path` reference
/// into one repository-relative path.
///
/// A bare `scheme://file.md` reference parses with the file name as host and
/// an empty path; that file name is the whole lookup path.
pub fn join_host_path(host: &str, path: &str) -> String {
    let joined = format!("{}/{}", host, path.trim_start_matches('/'));
    let joined = joined.trim_matches('/');
    if joined.is_empty() && host.ends_with(DOCUMENT_EXTENSION) {
        return host.to_string();
    }
    joined.to_string()
}

/// The case-insensitive key a document path is compared by.
pub fn lookup_key(path: &str) -> String {
    to_target_path(path).to_ascii_lowercase()
}

/// Join path segments with `/`, skipping empty segments.
pub fn join_segments<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every folder-level prefix of a published path, shortest first.
///
/// `a/b/c` yields `a/`, `a/b/`, `a/b/c/`.
pub fn folder_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push_str(segment);
        current.push('/');
        prefixes.push(current.clone());
    }
    prefixes
}

/// Characters escaped in cache file name components. `-` separates
/// components and `%` introduces an escape, so both are always encoded.
const CACHE_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.');

/// Encode a value so it can be used as one component of a cache file name.
///
/// The encoding is reversible with [`decode_path_component`], so distinct
/// values never share a file name.
pub fn encode_path_component(value: &str) -> String {
    utf8_percent_encode(value, CACHE_COMPONENT).to_string()
}

/// Reverse [`encode_path_component`]. Returns `None` for escapes that do
/// not decode to UTF-8.
pub fn decode_path_component(value: &str) -> Option<String> {
    percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
