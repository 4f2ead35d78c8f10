//! # Error Suggestions
//!
//! Helpers for errors that tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docmesh::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

/// The configuration file does not exist.
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a docmesh.yaml file next to your navigation.yml\n\
         hint: Use -c/--config to specify a different path\n\
         hint: Set DOCMESH_CONFIG environment variable",
        path = path.display()
    )
}

/// `cache clean` was called without any filter.
pub fn cache_clean_no_filter() -> anyhow::Error {
    anyhow::anyhow!(
        "At least one filter must be specified for cache clean\n\n\
         hint: Use --all to remove all cached manifests\n\
         hint: Use --repository <NAME> to remove one repository's manifests\n\
         hint: Use --older-than <DURATION> to remove old entries (e.g., '30d', '1w')"
    )
}

/// A repository named on the command line is not in the registry.
pub fn unknown_repository(repository: &str, candidates: &[&str]) -> anyhow::Error {
    let mut message = format!("Unknown repository: {}", repository);
    if let Some(similar) = find_similar(repository, candidates) {
        message.push_str(&format!("\n\nDid you mean '{}'?", similar));
    }
    message.push_str("\n\nhint: Run 'docmesh registry show' to list published repositories");
    anyhow::anyhow!(message)
}

/// A local manifest was expected but is missing.
pub fn local_manifest_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Local manifest not found: {path}\n\n\
         hint: Build the documentation first so that links.json is written\n\
         hint: Pass the manifest path explicitly as the last argument",
        path = path.display()
    )
}

/// The repository a local manifest belongs to could not be determined.
pub fn repository_not_named(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Cannot tell which repository {path} belongs to\n\n\
         hint: Use --repository <NAME>\n\
         hint: Or build with an origin name so the manifest records it",
        path = path.display()
    )
}

/// The run produced build-failing diagnostics.
pub fn diagnostics_failed(errors: usize, warnings: usize, strict: bool) -> anyhow::Error {
    if strict && warnings > 0 {
        anyhow::anyhow!(
            "{} error(s) and {} warning(s) found\n\n\
             hint: Warnings fail the build because strict mode is enabled",
            errors,
            warnings
        )
    } else {
        anyhow::anyhow!("{} error(s) found", errors)
    }
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in matrix[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                0
            } else {
                1
            };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}
