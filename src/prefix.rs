//! # Prefix Index
//!
//! The prefix index maps repository sources (`repo://folder/`) onto the
//! global path prefixes declared for them in the navigation. It is built
//! once by [`crate::navigation::NavigationAssembler`] and is immutable
//! afterwards, so it can be shared freely between threads.
//!
//! ## Lookup
//!
//! Entries are held in descending order of source length. A lookup for
//! `scheme://path` scans them in order and takes the first entry whose
//! source is a literal prefix of the lookup, which makes it a
//! longest-prefix match: with `repo://a/` and `repo://a/b/` registered,
//! `repo://a/b/c` resolves against `repo://a/b/`.
//!
//! Matching is ASCII case-insensitive.
//!
//! ## Output paths
//!
//! [`PrefixIndex::output_path`] decides where a source file lands in the
//! assembled site. A fixed allow-list bypasses the index: static assets and
//! the narrative repository's root files pass through unchanged, and known
//! legacy export folders are dropped. Anything else without a match is
//! quarantined under `_failed/<repo>/<path>` so one unmapped file does not
//! abort the build.

use std::fmt;

use glob::Pattern;

use crate::defaults;
use crate::error::{Error, Result};
use crate::path::{folder_prefixes, join_segments, normalize_separators, to_target_path};

/// Folder of static assets that is published unchanged.
pub const STATIC_FOLDER: &str = "_static/";

/// Folder unmapped files are quarantined under.
pub const FALLBACK_FOLDER: &str = "_failed";

/// A repository folder a navigation node binds to, e.g. `kibana://reference/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceUri {
    scheme: String,
    path: String,
}

impl SourceUri {
    /// Create a source from a repository name and folder.
    ///
    /// # Panics
    ///
    /// Panics if `scheme` is empty.
    pub fn new(scheme: &str, path: &str) -> Self {
        assert!(
            !scheme.trim().is_empty(),
            "a source URI needs a repository scheme"
        );
        Self {
            scheme: scheme.trim().to_ascii_lowercase(),
            path: normalize_separators(path).trim_matches('/').to_string(),
        }
    }

    /// Parse `scheme://folder`.
    pub fn parse(value: &str) -> Result<Self> {
        let (scheme, path) = value.split_once("://").ok_or_else(|| Error::InvalidCrossLink {
            link: value.to_string(),
            message: "expected '<repository>://<folder>'".to_string(),
        })?;
        if scheme.trim().is_empty() {
            return Err(Error::InvalidCrossLink {
                link: value.to_string(),
                message: "missing repository scheme".to_string(),
            });
        }
        Ok(Self::new(scheme, path))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Folder within the repository, without surrounding slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The source as it is matched: `scheme://` or `scheme://folder/`.
    pub fn as_prefix(&self) -> String {
        if self.path.is_empty() {
            format!("{}://", self.scheme)
        } else {
            format!("{}://{}/", self.scheme, self.path)
        }
    }
}

impl fmt::Display for SourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_prefix())
    }
}

/// One registered `(source, path prefix)` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixEntry {
    source: SourceUri,
    path_prefix: String,
    key: String,
}

impl PrefixEntry {
    pub fn source(&self) -> &SourceUri {
        &self.source
    }

    /// Global path prefix, without surrounding slashes.
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }
}

fn normalize_prefix(prefix: &str) -> String {
    normalize_separators(prefix).trim_matches('/').to_string()
}

/// Collects bindings and rejects duplicates as they are registered.
#[derive(Debug, Default)]
pub struct PrefixIndexBuilder {
    entries: Vec<PrefixEntry>,
}

impl PrefixIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `path_prefix`.
    ///
    /// Fails with `DuplicatePathPrefix` when another source already claims
    /// the same normalised prefix, and with `DuplicateNavigationSource` when
    /// the same source is bound twice.
    pub fn register(&mut self, source: SourceUri, path_prefix: &str) -> Result<()> {
        let path_prefix = normalize_prefix(path_prefix);
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.path_prefix.eq_ignore_ascii_case(&path_prefix))
        {
            return Err(Error::DuplicatePathPrefix {
                path_prefix,
                existing: existing.source.to_string(),
                duplicate: source.to_string(),
            });
        }

        let key = source.as_prefix().to_ascii_lowercase();
        if self.entries.iter().any(|e| e.key == key) {
            return Err(Error::DuplicateNavigationSource {
                source_uri: source.to_string(),
            });
        }

        self.entries.push(PrefixEntry {
            source,
            path_prefix,
            key,
        });
        Ok(())
    }

    pub fn build(mut self) -> PrefixIndex {
        // stable: equal lengths keep declaration order
        self.entries.sort_by(|a, b| b.key.len().cmp(&a.key.len()));
        PrefixIndex {
            entries: self.entries,
        }
    }
}

/// A successful longest-prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    entry: &'a PrefixEntry,
    remainder: String,
}

impl<'a> PrefixMatch<'a> {
    pub fn source(&self) -> &'a SourceUri {
        &self.entry.source
    }

    pub fn path_prefix(&self) -> &'a str {
        &self.entry.path_prefix
    }

    /// The looked-up path with the matched source folder stripped.
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    /// The global path: prefix joined with the remainder.
    pub fn output_path(&self) -> String {
        join_segments([self.entry.path_prefix.as_str(), self.remainder.as_str()])
    }
}

/// Where a source file lands in the assembled site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPath {
    /// Rewritten under a navigation node's path prefix.
    Mapped(String),
    /// Published unchanged.
    PassThrough(String),
    /// Not published.
    Dropped,
    /// No navigation node claims the file; quarantined.
    Fallback { path: String, reason: String },
}

/// The fixed allow-list applied before and after prefix matching.
#[derive(Debug, Clone)]
pub struct OutputRules {
    narrative: String,
    legacy_exports: Vec<Pattern>,
    unmapped_drops: Vec<Pattern>,
}

impl OutputRules {
    /// `legacy_exports` are globs over `repo://path` that are always dropped.
    pub fn new(narrative: &str, legacy_exports: &[String]) -> Result<Self> {
        Ok(Self {
            narrative: narrative.to_ascii_lowercase(),
            legacy_exports: legacy_exports
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<std::result::Result<_, _>>()?,
            unmapped_drops: defaults::UNMAPPED_DROPS
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<std::result::Result<_, _>>()?,
        })
    }

    pub fn narrative(&self) -> &str {
        &self.narrative
    }
}

impl Default for OutputRules {
    fn default() -> Self {
        Self {
            narrative: defaults::NARRATIVE_REPOSITORY.to_string(),
            legacy_exports: Vec::new(),
            unmapped_drops: defaults::UNMAPPED_DROPS
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }
}

/// Immutable, longest-prefix-first index of navigation bindings.
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    entries: Vec<PrefixEntry>,
}

impl PrefixIndex {
    /// Entries in lookup order (longest source first).
    pub fn entries(&self) -> &[PrefixEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any navigation node binds a folder of `scheme`.
    pub fn binds_repository(&self, scheme: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.source.scheme.eq_ignore_ascii_case(scheme))
    }

    /// Longest-prefix match of `scheme://path`.
    pub fn resolve(&self, scheme: &str, path: &str) -> Option<PrefixMatch<'_>> {
        let path = normalize_separators(path);
        let path = path.trim_matches('/');
        let lookup = if path.is_empty() {
            format!("{}://", scheme)
        } else {
            format!("{}://{}/", scheme, path)
        }
        .to_ascii_lowercase();

        let entry = self.entries.iter().find(|e| lookup.starts_with(&e.key))?;
        let remainder = path
            .get(entry.source.path.len()..)
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string();
        Some(PrefixMatch { entry, remainder })
    }

    /// Every global folder a document could be addressed at.
    ///
    /// For `repo://a/b.md` bound under `docs` this is `docs/`, `docs/a/` and
    /// `docs/a/b/`. Returns `None` when no navigation node claims the
    /// document.
    pub fn sub_paths(&self, scheme: &str, document_path: &str) -> Option<Vec<String>> {
        let target = to_target_path(document_path);
        let matched = self.resolve(scheme, &target)?;
        let prefix = matched.path_prefix();

        let mut paths = vec![folder(prefix)];
        paths.extend(
            folder_prefixes(matched.remainder())
                .iter()
                .map(|p| folder(&join_segments([prefix, p.as_str()]))),
        );
        Some(paths)
    }

    /// The most specific navigation source whose folder contains `path`,
    /// ignoring the repository. Root sources reserve nothing.
    pub fn reserving_entry(&self, path: &str) -> Option<&PrefixEntry> {
        let path = normalize_separators(path).trim_start_matches('/').to_ascii_lowercase();
        self.entries.iter().find(|e| {
            !e.source.path.is_empty()
                && path.starts_with(&format!("{}/", e.source.path.to_ascii_lowercase()))
        })
    }

    /// Decide where `relative_path` of repository `scheme` is published.
    pub fn output_path(&self, scheme: &str, relative_path: &str, rules: &OutputRules) -> OutputPath {
        let relative = normalize_separators(relative_path);
        let relative = relative.trim_start_matches('/');

        if relative.starts_with(STATIC_FOLDER) {
            return OutputPath::PassThrough(relative.to_string());
        }

        let uri = format!("{}://{}", scheme, relative);
        if rules.legacy_exports.iter().any(|p| p.matches(&uri)) {
            return OutputPath::Dropped;
        }

        if scheme.eq_ignore_ascii_case(&rules.narrative) && !relative.contains('/') {
            return OutputPath::PassThrough(relative.to_string());
        }

        if let Some(matched) = self.resolve(scheme, relative) {
            return OutputPath::Mapped(matched.output_path());
        }

        if rules.unmapped_drops.iter().any(|p| p.matches(relative)) {
            return OutputPath::Dropped;
        }

        let path = format!("{}/{}/{}", FALLBACK_FOLDER, scheme, relative);
        OutputPath::Fallback {
            reason: format!("No navigation source for '{}', falling back to '{}'", uri, path),
            path,
        }
    }
}

fn folder(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}/", path)
    }
}
