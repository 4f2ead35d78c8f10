//! # Cross-repository Consistency
//!
//! No repository can see whether its documents collide with another
//! repository's once both are mapped into the global hierarchy. This module
//! replays every published document through the [`PrefixIndex`] and reports
//! global paths claimed by more than one repository.
//!
//! A document is addressable at every folder level of its global path (an
//! `index` page collapses onto its folder), so each level is a claim.
//! Paths listed as phantoms are allowed to be shared.
//!
//! [`check_namespaces`] is the per-repository variant: it checks one
//! repository's links against source folders the navigation reserves for a
//! different repository.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::manifest::Manifest;
use crate::prefix::{PrefixIndex, SourceUri};

/// Two repositories publish into the same global path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "'{second}://{second_document}' resolves to '{path}' which is already claimed by '{first}://{first_document}'"
)]
pub struct CollisionError {
    /// The shared global path, with a trailing `/`.
    pub path: String,
    pub first: String,
    pub first_document: String,
    pub second: String,
    pub second_document: String,
}

/// A link living in a source folder reserved for another repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("'{link}' lives in path_prefix already claimed by '{claimed_by}' in global navigation.yml")]
pub struct NamespaceViolation {
    pub repository: String,
    pub link: String,
    pub claimed_by: String,
}

fn normalize_phantom(path: &str) -> String {
    path.trim_matches('/').to_ascii_lowercase()
}

/// Global paths that may be claimed by more than one repository.
///
/// A bare path (`reference/shared`) is shared by any repositories. A
/// scheme-qualified one (`kibana://reference/shared`) only exempts
/// collisions involving that repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhantomSet {
    bare: BTreeSet<String>,
    scoped: BTreeSet<(String, String)>,
}

impl PhantomSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, phantom: &str) {
        match phantom.split_once("://") {
            Some((scheme, path)) => {
                self.scoped
                    .insert((scheme.to_ascii_lowercase(), normalize_phantom(path)));
            }
            None => {
                self.bare.insert(normalize_phantom(phantom));
            }
        }
    }

    pub fn insert_source(&mut self, source: &SourceUri) {
        self.scoped
            .insert((source.scheme().to_string(), normalize_phantom(source.path())));
    }

    pub fn len(&self) -> usize {
        self.bare.len() + self.scoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a collision on `path` between `first` and `second` is allowed.
    pub fn allows(&self, path: &str, first: &str, second: &str) -> bool {
        let path = normalize_phantom(path);
        self.bare.contains(&path)
            || [first, second].iter().any(|repository| {
                self.scoped
                    .contains(&(repository.to_ascii_lowercase(), path.clone()))
            })
    }
}

impl<S: AsRef<str>> FromIterator<S> for PhantomSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = PhantomSet::new();
        for phantom in iter {
            set.insert(phantom.as_ref());
        }
        set
    }
}

struct Claim<'a> {
    repository: &'a str,
    document: &'a str,
}

/// Report every global path published by more than one repository.
///
/// Repositories are visited in name order, so the first claimant of a path
/// is deterministic. Each `(path, first, second)` collision is reported
/// once.
pub fn check(
    manifests: &BTreeMap<String, Arc<Manifest>>,
    prefix_index: &PrefixIndex,
    phantoms: &PhantomSet,
) -> Vec<CollisionError> {
    let mut claimed: HashMap<String, Claim<'_>> = HashMap::new();
    let mut reported: BTreeSet<(String, String, String)> = BTreeSet::new();
    let mut collisions = Vec::new();

    for (repository, manifest) in manifests {
        for document in manifest.links().keys() {
            let Some(paths) = prefix_index.sub_paths(repository, document) else {
                debug!(
                    "{}://{} is not covered by the navigation, skipping collision check",
                    repository, document
                );
                continue;
            };
            for path in paths {
                match claimed.get(&path) {
                    None => {
                        claimed.insert(
                            path,
                            Claim {
                                repository: repository.as_str(),
                                document: document.as_str(),
                            },
                        );
                    }
                    Some(claim) if claim.repository == repository.as_str() => {}
                    Some(claim) => {
                        if phantoms.allows(&path, claim.repository, repository) {
                            debug!("'{}' is a phantom path, skipping collision check", path);
                            continue;
                        }
                        let key = (
                            path.clone(),
                            claim.repository.to_string(),
                            repository.clone(),
                        );
                        if reported.insert(key) {
                            collisions.push(CollisionError {
                                first: claim.repository.to_string(),
                                first_document: claim.document.to_string(),
                                second: repository.clone(),
                                second_document: document.clone(),
                                path,
                            });
                        }
                    }
                }
            }
        }
    }

    collisions
}

/// Check `repository`'s links against folders the navigation binds to
/// another repository.
pub fn check_namespaces(
    repository: &str,
    manifest: &Manifest,
    prefix_index: &PrefixIndex,
) -> Vec<NamespaceViolation> {
    manifest
        .links()
        .keys()
        .filter_map(|link| {
            let entry = prefix_index.reserving_entry(link)?;
            if entry.source().scheme().eq_ignore_ascii_case(repository) {
                return None;
            }
            Some(NamespaceViolation {
                repository: repository.to_string(),
                link: link.clone(),
                claimed_by: entry.source().to_string(),
            })
        })
        .collect()
}
