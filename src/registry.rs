//! # Link Registry Index
//!
//! The registry is the global index of published manifests:
//!
//! ```json
//! {
//!   "repositories": {
//!     "kibana": {
//!       "main": {
//!         "repository": "kibana",
//!         "branch": "main",
//!         "path": "elastic/kibana/main/links.json",
//!         "etag": "6c0f1d...",
//!         "ref": "4f1c2e...",
//!         "updated_at": "2025-03-01T12:00:00Z"
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! The `etag` is the content tag: it changes whenever the manifest content
//! changes and keys the [`crate::cache::ManifestCache`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One row of the registry: where a repository branch's manifest lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub repository: String,
    pub branch: String,
    /// Changes whenever the manifest content changes.
    #[serde(rename = "etag")]
    pub content_tag: String,
    /// Manifest location, relative to the manifest base URL or absolute.
    #[serde(rename = "path")]
    pub manifest_location: String,
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The global registry index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRegistry {
    #[serde(default)]
    pub repositories: BTreeMap<String, BTreeMap<String, RegistryEntry>>,
}

impl LinkRegistry {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::ManifestParse {
            repository: "link-index".to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn contains(&self, repository: &str) -> bool {
        self.repositories.contains_key(repository)
    }

    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.repositories.keys().map(String::as_str)
    }

    /// Select a repository's entry by trying `branches` in order.
    ///
    /// Returns `Ok(None)` when the repository is not in the registry at all,
    /// and `Error::BranchNotFound` when it is but publishes none of the
    /// branches.
    pub fn entry_for(&self, repository: &str, branches: &[String]) -> Result<Option<&RegistryEntry>> {
        let Some(by_branch) = self.repositories.get(repository) else {
            return Ok(None);
        };
        branches
            .iter()
            .find_map(|branch| by_branch.get(branch))
            .map(Some)
            .ok_or_else(|| Error::BranchNotFound {
                repository: repository.to_string(),
                branches: branches.to_vec(),
            })
    }

    /// Merge `entry` into the registry.
    ///
    /// An existing `(repository, branch)` row is only replaced by a strictly
    /// newer entry; a repository seen for the first time is always added.
    pub fn with_entry(mut self, entry: RegistryEntry) -> Self {
        let by_branch = self.repositories.entry(entry.repository.clone()).or_default();
        match by_branch.get(&entry.branch) {
            Some(existing) if !is_newer(&entry, existing) => {}
            _ => {
                by_branch.insert(entry.branch.clone(), entry);
            }
        }
        self
    }
}

fn is_newer(candidate: &RegistryEntry, existing: &RegistryEntry) -> bool {
    match (candidate.updated_at, existing.updated_at) {
        (Some(candidate), Some(existing)) => candidate > existing,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
