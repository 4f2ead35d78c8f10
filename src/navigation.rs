//! # Global Navigation
//!
//! Parses the global navigation declaration and assembles it, together with
//! each repository's parsed table of contents, into the [`PrefixIndex`] and
//! the document map.
//!
//! ## Declaration format
//!
//! ```yaml
//! phantoms:
//!   - toc: elasticsearch://reference/search-connectors
//! toc:
//!   - toc: get-started
//!     children:
//!       - repo: apm-server
//!   - toc: elasticsearch://reference/elasticsearch
//!     path_prefix: reference/elasticsearch
//!     children:
//!       - toc: docs-content://reference/elasticsearch/clients
//!         path_prefix: reference/elasticsearch/clients
//! ```
//!
//! - A `toc` without `://` is a folder of the narrative repository. It owns
//!   the path prefix of the same name and becomes the parent folder of nested
//!   `repo` entries.
//! - `repo: x` binds `x://<parent>` under `<parent>/x`. It cannot be combined
//!   with `toc`.
//! - A node without `path_prefix` falls back to `<repo>/<folder>`.
//!
//! Nesting is bounded by a configurable maximum depth.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::path::{join_segments, normalize_separators};
use crate::prefix::{PrefixIndex, PrefixIndexBuilder, SourceUri};

const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNavigationFile {
    #[serde(default)]
    toc: Vec<RawTocEntry>,
    #[serde(default)]
    phantoms: Vec<RawPhantom>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTocEntry {
    toc: Option<String>,
    repo: Option<String>,
    path_prefix: Option<String>,
    #[serde(default)]
    children: Vec<RawTocEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPhantom {
    toc: String,
}

/// Parsing options for the navigation declaration.
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Repository bare `toc` folders belong to.
    pub narrative: String,
    pub max_depth: usize,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            narrative: defaults::NARRATIVE_REPOSITORY.to_string(),
            max_depth: defaults::NAVIGATION_MAX_DEPTH,
        }
    }
}

/// A node of the navigation forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavNode {
    pub source: SourceUri,
    /// Global path prefix owned by this node and its subtree.
    pub path_prefix: String,
    pub children: Vec<NavNode>,
}

/// The parsed navigation declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationDeclaration {
    pub nodes: Vec<NavNode>,
    /// Sources that are declared but intentionally not part of the tree.
    pub phantoms: Vec<SourceUri>,
}

struct Parser<'a> {
    source_file: &'a str,
    options: &'a NavigationOptions,
}

impl Parser<'_> {
    fn error(&self, message: String) -> Error {
        Error::NavigationParse {
            source_file: self.source_file.to_string(),
            message,
        }
    }

    fn entries(&self, raw: &[RawTocEntry], parent: Option<&str>, depth: usize) -> Result<Vec<NavNode>> {
        raw.iter()
            .map(|entry| self.entry(entry, parent, depth))
            .collect()
    }

    fn entry(&self, raw: &RawTocEntry, parent: Option<&str>, depth: usize) -> Result<NavNode> {
        let mut parent = parent.map(str::to_string);
        let mut path_prefix = raw.path_prefix.clone();

        let source = match (&raw.toc, &raw.repo) {
            (Some(toc), Some(_)) => {
                return Err(self.error(format!(
                    "toc config defines 'repo' can not be combined with 'toc': {}",
                    toc
                )))
            }
            (Some(toc), None) if toc.contains("://") => SourceUri::parse(toc)?,
            (Some(toc), None) => {
                let folder = normalize_separators(toc).trim_matches('/').to_string();
                if path_prefix.is_none() {
                    path_prefix = Some(folder.clone());
                }
                parent = Some(folder.clone());
                SourceUri::new(&self.options.narrative, &folder)
            }
            (None, Some(repo)) if repo.trim().is_empty() => {
                return Err(self.error("toc entry defines an empty 'repo'".to_string()))
            }
            (None, Some(repo)) => {
                let parent_folder = parent.as_deref().unwrap_or_default();
                path_prefix = Some(join_segments([parent_folder, repo.as_str()]));
                SourceUri::new(repo, parent_folder)
            }
            (None, None) => {
                return Err(self.error(
                    "toc entry defines neither 'toc' nor 'repo'".to_string(),
                ))
            }
        };

        if depth > self.options.max_depth {
            return Err(Error::NavigationTooDeep {
                source_uri: source.to_string(),
                max_depth: self.options.max_depth,
            });
        }

        let path_prefix = match path_prefix.filter(|p| !p.trim_matches('/').is_empty()) {
            Some(prefix) => prefix,
            None => {
                let fallback = join_segments([source.scheme(), source.path()]);
                warn!(
                    "{}: path prefix is not defined for {}, falling back to {} which may be incorrect",
                    self.source_file, source, fallback
                );
                fallback
            }
        };

        let children = self.entries(&raw.children, parent.as_deref(), depth + 1)?;
        Ok(NavNode {
            source,
            path_prefix: path_prefix.trim_matches('/').to_string(),
            children,
        })
    }
}

impl NavigationDeclaration {
    /// Parse a declaration from YAML.
    pub fn parse(yaml: &str, options: &NavigationOptions) -> Result<Self> {
        Self::parse_named(INLINE_SOURCE, yaml, options)
    }

    /// Read and parse the declaration at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, options: &NavigationOptions) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::parse_named(&path.display().to_string(), &yaml, options)
    }

    fn parse_named(source_file: &str, yaml: &str, options: &NavigationOptions) -> Result<Self> {
        let raw: RawNavigationFile =
            serde_yaml::from_str(yaml).map_err(|e| Error::NavigationParse {
                source_file: source_file.to_string(),
                message: e.to_string(),
            })?;

        let parser = Parser {
            source_file,
            options,
        };
        let nodes = parser.entries(&raw.toc, None, 1)?;
        let phantoms = raw
            .phantoms
            .iter()
            .map(|p| SourceUri::parse(&p.toc))
            .collect::<Result<_>>()?;

        Ok(Self { nodes, phantoms })
    }

    /// Every node in declaration (pre-)order, paired with its depth.
    pub fn walk(&self) -> Vec<(usize, &NavNode)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &NavNode)> = self.nodes.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }
}

/// One entry of a repository's parsed table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TocItem {
    /// A nested table of contents, e.g. `kibana://reference/setup/`.
    Toc {
        source: String,
        #[serde(default)]
        children: Vec<TocItem>,
    },
    /// A document, repository-relative.
    File {
        path: String,
        #[serde(default)]
        children: Vec<TocItem>,
    },
    /// A folder grouping documents.
    Folder {
        path: String,
        #[serde(default)]
        children: Vec<TocItem>,
    },
}

impl TocItem {
    fn children(&self) -> &[TocItem] {
        match self {
            TocItem::Toc { children, .. }
            | TocItem::File { children, .. }
            | TocItem::Folder { children, .. } => children,
        }
    }
}

/// A repository's table of contents below one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocTree {
    #[serde(default)]
    pub items: Vec<TocItem>,
    /// Every valid document path; empty means unchecked.
    #[serde(default)]
    pub files: BTreeSet<String>,
}

/// Parsed TOC trees keyed by the source they describe.
#[derive(Debug, Clone, Default)]
pub struct TocTrees {
    trees: BTreeMap<SourceUri, TocTree>,
}

impl TocTrees {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `{"repo://folder/": {"items": [...]}}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, TocTree> = serde_json::from_str(json)?;
        let mut trees = Self::new();
        for (source, tree) in raw {
            trees.insert(SourceUri::parse(&source)?, tree);
        }
        Ok(trees)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn insert(&mut self, source: SourceUri, tree: TocTree) {
        self.trees.insert(source, tree);
    }

    pub fn get(&self, source: &SourceUri) -> Option<&TocTree> {
        self.trees.get(source)
    }
}

/// Identifies a source document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    pub repository: String,
    pub path: String,
}

/// Where a document is published and in which order it is navigated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPlacement {
    pub output_path: String,
    /// Zero-based position in the global navigation order.
    pub position: usize,
    /// Navigation node whose tree listed the document.
    pub navigation_root: SourceUri,
}

/// The result of assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembledNavigation {
    pub prefix_index: PrefixIndex,
    pub documents: BTreeMap<DocumentKey, DocumentPlacement>,
}

impl AssembledNavigation {
    pub fn document(&self, repository: &str, path: &str) -> Option<&DocumentPlacement> {
        self.documents.get(&DocumentKey {
            repository: repository.to_ascii_lowercase(),
            path: normalize_separators(path).trim_start_matches('/').to_string(),
        })
    }
}

/// Builds the prefix index and document map from a declaration.
pub struct NavigationAssembler<'a> {
    declaration: &'a NavigationDeclaration,
}

impl<'a> NavigationAssembler<'a> {
    pub fn new(declaration: &'a NavigationDeclaration) -> Self {
        Self { declaration }
    }

    /// Register every node and fail on the first duplicate.
    pub fn build_index(&self) -> Result<PrefixIndex> {
        let mut builder = PrefixIndexBuilder::new();
        for (_, node) in self.declaration.walk() {
            builder.register(node.source.clone(), &node.path_prefix)?;
        }
        let index = builder.build();
        debug!("Built prefix index with {} entries", index.len());
        Ok(index)
    }

    /// Build the index, then place every document of every bound TOC tree.
    ///
    /// A nested TOC that is itself bound by another node is placed when that
    /// node is visited, not inline. Missing trees are logged and skipped.
    pub fn assemble(&self, trees: &TocTrees) -> Result<AssembledNavigation> {
        let prefix_index = self.build_index()?;
        let bound: BTreeSet<&SourceUri> = prefix_index.entries().iter().map(|e| e.source()).collect();
        let mut documents = BTreeMap::new();

        for (_, node) in self.declaration.walk() {
            let Some(tree) = trees.get(&node.source) else {
                warn!("No toc tree found for {}", node.source);
                continue;
            };

            let scheme = node.source.scheme();
            let mut queue: Vec<&TocItem> = tree.items.iter().rev().collect();
            while let Some(item) = queue.pop() {
                match item {
                    TocItem::Toc { source, .. } => {
                        let nested = SourceUri::parse(source)?;
                        if nested != node.source && bound.contains(&nested) {
                            continue;
                        }
                    }
                    TocItem::File { path, .. } => {
                        let path = normalize_separators(path).trim_start_matches('/').to_string();
                        if !tree.files.is_empty() && !tree.files.contains(&path) {
                            warn!("{}: '{}' is listed in the toc but does not exist", node.source, path);
                        } else if let Some(matched) = prefix_index.resolve(scheme, &path) {
                            let key = DocumentKey {
                                repository: scheme.to_string(),
                                path,
                            };
                            if documents.contains_key(&key) {
                                warn!("{}://{} is listed more than once", key.repository, key.path);
                            } else {
                                let placement = DocumentPlacement {
                                    output_path: matched.output_path(),
                                    position: documents.len(),
                                    navigation_root: node.source.clone(),
                                };
                                documents.insert(key, placement);
                            }
                        } else {
                            warn!("{}://{} is not claimed by any navigation node", scheme, path);
                        }
                    }
                    TocItem::Folder { .. } => {}
                }
                queue.extend(item.children().iter().rev());
            }
        }

        Ok(AssembledNavigation {
            prefix_index,
            documents,
        })
    }
}
