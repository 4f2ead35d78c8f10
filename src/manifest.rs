//! # Repository Manifests
//!
//! Each repository publishes a manifest (`links.json`) listing every document
//! it publishes, the anchors inside each document, the legacy paths it
//! redirects and the cross-links its own documents make to other
//! repositories.
//!
//! ```json
//! {
//!   "origin": { "branch": "main", "remote": "elastic/kibana", "ref": "4f1c2e" },
//!   "url_path_prefix": "",
//!   "links": { "guide/intro.md": { "anchors": ["setup"] } },
//!   "cross_links": ["elasticsearch://reference/index.md"],
//!   "redirects": {
//!     "old/path.md": { "to": "new/path.md", "anchors": { "!": "!" } },
//!     "split.md": { "many": [ { "to": "a.md", "anchors": { "x": "y" } }, { "to": "b.md" } ] }
//!   }
//! }
//! ```
//!
//! Manifests are immutable once loaded. Lookups are case-insensitive and
//! ignore the document extension and an `index` leaf, so a lookup index keyed
//! by [`crate::path::lookup_key`] is built once at load time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::path::lookup_key;

/// Anchor key that makes a redirect drop any fragment.
pub const DROP_ALL_ANCHORS: &str = "!";

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Identity of the checkout a manifest was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default, rename = "ref")]
    pub git_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Metadata for one published document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    /// Valid in-page anchors.
    #[serde(default, deserialize_with = "null_as_default")]
    pub anchors: BTreeSet<String>,
    /// Published but excluded from navigation.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

impl LinkMetadata {
    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.anchors.contains(anchor)
    }
}

/// How a redirect rewrites the fragment of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorRewrite {
    /// The redirect subsumes fragment navigation: any fragment is dropped.
    DropAll,
    /// Old fragment to new fragment; `None` drops the fragment.
    Map(BTreeMap<String, Option<String>>),
}

impl AnchorRewrite {
    fn from_raw(raw: BTreeMap<String, Option<String>>) -> Option<Self> {
        if raw.is_empty() {
            None
        } else if raw.contains_key(DROP_ALL_ANCHORS) {
            Some(AnchorRewrite::DropAll)
        } else {
            Some(AnchorRewrite::Map(raw))
        }
    }

    fn to_raw(&self) -> BTreeMap<String, Option<String>> {
        match self {
            AnchorRewrite::DropAll => BTreeMap::from([(
                DROP_ALL_ANCHORS.to_string(),
                Some(DROP_ALL_ANCHORS.to_string()),
            )]),
            AnchorRewrite::Map(map) => map.clone(),
        }
    }

    /// Rewrite `fragment`.
    ///
    /// Returns `None` when the rewrite does not handle the fragment, and
    /// `Some(None)` when the fragment is dropped.
    pub fn rewrite(&self, fragment: &str) -> Option<Option<String>> {
        match self {
            AnchorRewrite::DropAll => Some(None),
            AnchorRewrite::Map(map) => map.get(fragment).map(|target| match target.as_deref() {
                None | Some("") | Some(DROP_ALL_ANCHORS) => None,
                Some(anchor) => Some(anchor.to_string()),
            }),
        }
    }
}

/// One redirect destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Repository-relative destination; empty keeps the original path.
    pub to: String,
    pub anchors: Option<AnchorRewrite>,
}

/// A redirect rule for one legacy path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRedirect", into = "RawRedirect")]
pub enum RedirectSpec {
    Single(RedirectTarget),
    /// Ambiguous redirect, disambiguated by the fragment at resolve time.
    FanOut(Vec<RedirectTarget>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRedirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anchors: Option<BTreeMap<String, Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    many: Option<Vec<RawRedirect>>,
}

impl From<RawRedirect> for RedirectTarget {
    fn from(raw: RawRedirect) -> Self {
        RedirectTarget {
            to: raw.to.unwrap_or_default(),
            anchors: raw.anchors.and_then(AnchorRewrite::from_raw),
        }
    }
}

impl From<RawRedirect> for RedirectSpec {
    fn from(mut raw: RawRedirect) -> Self {
        match raw.many.take() {
            Some(many) if !many.is_empty() => {
                RedirectSpec::FanOut(many.into_iter().map(RedirectTarget::from).collect())
            }
            _ => RedirectSpec::Single(RedirectTarget::from(raw)),
        }
    }
}

impl From<&RedirectTarget> for RawRedirect {
    fn from(target: &RedirectTarget) -> Self {
        RawRedirect {
            to: (!target.to.is_empty()).then(|| target.to.clone()),
            anchors: target.anchors.as_ref().map(AnchorRewrite::to_raw),
            many: None,
        }
    }
}

impl From<RedirectSpec> for RawRedirect {
    fn from(spec: RedirectSpec) -> Self {
        match &spec {
            RedirectSpec::Single(target) => RawRedirect::from(target),
            RedirectSpec::FanOut(targets) => RawRedirect {
                many: Some(targets.iter().map(RawRedirect::from).collect()),
                ..RawRedirect::default()
            },
        }
    }
}

impl RedirectSpec {
    /// The candidate destinations, in declaration order.
    pub fn targets(&self) -> &[RedirectTarget] {
        match self {
            RedirectSpec::Single(target) => std::slice::from_ref(target),
            RedirectSpec::FanOut(targets) => targets,
        }
    }
}

/// A repository's published link manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<Origin>,
    #[serde(default)]
    url_path_prefix: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    links: BTreeMap<String, LinkMetadata>,
    #[serde(default, deserialize_with = "null_as_default")]
    cross_links: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    redirects: BTreeMap<String, RedirectSpec>,
    #[serde(skip)]
    index: LookupIndex,
}

/// Lookup key to the key as published.
#[derive(Debug, Clone, Default)]
struct LookupIndex {
    links: HashMap<String, String>,
    redirects: HashMap<String, String>,
}

impl Manifest {
    /// Decode a manifest published by `repository`.
    pub fn from_slice(repository: &str, bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| Error::ManifestParse {
                repository: repository.to_string(),
                message: e.to_string(),
            })?;
        Ok(manifest.indexed(repository))
    }

    /// Decode a manifest from a JSON string.
    pub fn from_json(repository: &str, json: &str) -> Result<Self> {
        Self::from_slice(repository, json.as_bytes())
    }

    /// Read a locally built manifest, e.g. `.artifacts/docs/html/links.json`.
    pub fn from_file<P: AsRef<Path>>(repository: &str, path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_slice(repository, &bytes)
    }

    fn indexed(mut self, repository: &str) -> Self {
        let mut index = LookupIndex::default();
        for key in self.links.keys() {
            if let Some(existing) = index.links.insert(lookup_key(key), key.clone()) {
                warn!(
                    "{}: '{}' and '{}' normalise to the same link, keeping '{}'",
                    repository, existing, key, existing
                );
                index.links.insert(lookup_key(key), existing);
            }
        }
        for key in self.redirects.keys() {
            index
                .redirects
                .entry(lookup_key(key))
                .or_insert_with(|| key.clone());
        }
        self.index = index;
        self
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    pub fn url_path_prefix(&self) -> Option<&str> {
        self.url_path_prefix.as_deref()
    }

    /// Every published document path, as published.
    pub fn links(&self) -> &BTreeMap<String, LinkMetadata> {
        &self.links
    }

    /// Cross-links this repository's documents make to other repositories.
    pub fn cross_links(&self) -> &BTreeSet<String> {
        &self.cross_links
    }

    pub fn redirects(&self) -> &BTreeMap<String, RedirectSpec> {
        &self.redirects
    }

    /// Look up a document by any spelling of its path.
    ///
    /// Returns the path as published together with its metadata.
    pub fn link(&self, path: &str) -> Option<(&str, &LinkMetadata)> {
        let key = self.index.links.get(&lookup_key(path))?;
        self.links
            .get_key_value(key)
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_link(&self, path: &str) -> bool {
        self.index.links.contains_key(&lookup_key(path))
    }

    /// Look up the redirect rule for any spelling of a legacy path.
    pub fn redirect(&self, path: &str) -> Option<&RedirectSpec> {
        let key = self.index.redirects.get(&lookup_key(path))?;
        self.redirects.get(key)
    }
}
