//! Default values for docmesh configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Registry index fetched when the configuration does not name one.
pub const REGISTRY_URL: &str = "https://elastic-docs-link-index.s3.us-east-2.amazonaws.com/link-index.json";

/// Name of the build configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "docmesh.yaml";

/// Branches tried, in order, when selecting a repository's manifest.
pub const BRANCHES: &[&str] = &["main", "master"];

/// Repository whose bare `toc:` entries and root files are special-cased.
pub const NARRATIVE_REPOSITORY: &str = "docs-content";

/// Per-call network timeout.
pub const FETCH_TIMEOUT_SECS: u64 = 5;

/// Retries after the first attempt for transient transport errors.
pub const FETCH_RETRIES: u32 = 2;

/// Delay before the first retry; doubled on each further attempt.
pub const FETCH_BACKOFF_MILLIS: u64 = 250;

/// Maximum nesting of the navigation declaration.
pub const NAVIGATION_MAX_DEPTH: usize = 16;

/// Paths that are dropped when no navigation node claims them.
pub const UNMAPPED_DROPS: &[&str] = &[
    "raw-migrated-files/*",
    "images/*",
    "examples/*",
    "docset.yml",
    "doc_examples*",
    "*.asciidoc",
];

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/docmesh` (XDG Base Directory)
/// - macOS: `~/Library/Caches/docmesh`
/// - Windows: `{FOLDERID_LocalAppData}\docmesh`
///
/// Falls back to `.docmesh-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `DOCMESH_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".docmesh-cache"))
        .join("docmesh")
}

/// Worker count for the fetch phase: one per available core.
pub fn fetch_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
