//! Fetch phase: load the registry and the manifests of every repository
//! taking part in the build.
//!
//! One task runs per repository on a bounded rayon pool. Tasks only share
//! the [`crate::cache::ManifestCache`] and the result list. A failed fetch is
//! recorded against its repository and never aborts the others; the
//! resolver turns it into a `FetchFailed` diagnostic for that repository.
//!
//! Cancellation discards everything fetched so far.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::client::LinkRegistryClient;
use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::registry::RegistryEntry;

/// The manifests available to a build.
#[derive(Debug, Clone, Default)]
pub struct FetchedManifests {
    manifests: BTreeMap<String, Arc<Manifest>>,
    declared: BTreeSet<String>,
    entries: BTreeMap<String, RegistryEntry>,
    failures: BTreeMap<String, String>,
}

fn key(repository: &str) -> String {
    repository.trim().to_ascii_lowercase()
}

impl FetchedManifests {
    /// An empty set for the given declared repositories.
    pub fn new<I, S>(declared: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            declared: declared.into_iter().map(|r| key(r.as_ref())).collect(),
            ..Self::default()
        }
    }

    /// Replace (or add) one repository's manifest, e.g. with a locally
    /// built one. A recorded fetch failure for it is cleared.
    pub fn with_manifest(mut self, repository: &str, manifest: Manifest) -> Self {
        let repository = key(repository);
        self.failures.remove(&repository);
        self.manifests.insert(repository, Arc::new(manifest));
        self
    }

    /// Record that `repository` could not be fetched.
    pub fn with_failure(mut self, repository: &str, message: &str) -> Self {
        self.failures.insert(key(repository), message.to_string());
        self
    }

    pub fn manifest(&self, repository: &str) -> Option<&Manifest> {
        self.manifests.get(&key(repository)).map(Arc::as_ref)
    }

    /// Every loaded manifest, by repository.
    pub fn manifests(&self) -> &BTreeMap<String, Arc<Manifest>> {
        &self.manifests
    }

    pub fn is_declared(&self, repository: &str) -> bool {
        self.declared.contains(&key(repository))
    }

    pub fn declared(&self) -> &BTreeSet<String> {
        &self.declared
    }

    /// Registry entry a manifest was fetched from.
    pub fn entry(&self, repository: &str) -> Option<&RegistryEntry> {
        self.entries.get(&key(repository))
    }

    pub fn failure(&self, repository: &str) -> Option<&str> {
        self.failures.get(&key(repository)).map(String::as_str)
    }

    pub fn failures(&self) -> &BTreeMap<String, String> {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

/// Which repositories are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchScope {
    /// Only the declared repositories.
    #[default]
    Declared,
    /// Every repository in the registry, as an audit does.
    All,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Branch names in preference order.
    pub branches: Vec<String>,
    /// Worker threads; 0 uses one per available core.
    pub concurrency: usize,
    pub scope: FetchScope,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            branches: defaults::BRANCHES.iter().map(|b| b.to_string()).collect(),
            concurrency: 0,
            scope: FetchScope::Declared,
        }
    }
}

/// Fetch the manifests of `declared` (or of every registry repository).
///
/// `on_fetched` is called once per repository as its task completes.
pub fn execute(
    client: &LinkRegistryClient,
    declared: &[String],
    options: &FetchOptions,
    on_fetched: &(dyn Fn(&str) + Sync),
) -> Result<FetchedManifests> {
    let registry = client.fetch_registry()?;
    let mut fetched = FetchedManifests::new(declared);

    let repositories: BTreeSet<String> = match options.scope {
        FetchScope::Declared => fetched.declared.clone(),
        FetchScope::All => registry
            .repository_names()
            .map(key)
            .chain(fetched.declared.iter().cloned())
            .collect(),
    };
    if options.scope == FetchScope::All {
        fetched.declared = repositories.clone();
    }

    let mut tasks: Vec<RegistryEntry> = Vec::new();
    for repository in &repositories {
        match registry.entry_for(repository, &options.branches) {
            Ok(Some(entry)) => tasks.push(entry.clone()),
            Ok(None) => {
                warn!("'{}' has not published a manifest yet", repository);
            }
            Err(e) => {
                warn!("{}", e);
                fetched.failures.insert(repository.clone(), e.to_string());
            }
        }
    }

    let concurrency = match options.concurrency {
        0 => defaults::fetch_concurrency(),
        n => n,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
        .map_err(|e| Error::WorkerPool {
            message: e.to_string(),
        })?;

    info!(
        "Fetching {} manifest(s) with {} worker(s)",
        tasks.len(),
        concurrency
    );

    let results: Mutex<Vec<(RegistryEntry, Result<Manifest>)>> = Mutex::new(Vec::new());
    pool.install(|| {
        tasks.par_iter().for_each(|entry| {
            let result = client.fetch_manifest(entry);
            on_fetched(&entry.repository);
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((entry.clone(), result));
        });
    });

    client.cancellation().check("fetch manifests")?;

    let results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
    for (entry, result) in results {
        let repository = key(&entry.repository);
        match result {
            Ok(manifest) => {
                debug!("Loaded manifest for {}@{}", repository, entry.branch);
                fetched.manifests.insert(repository.clone(), Arc::new(manifest));
                fetched.entries.insert(repository, entry);
            }
            Err(e @ Error::Cancelled { .. }) => return Err(e),
            Err(e) => {
                warn!("Failed to fetch manifest for '{}': {}", repository, e);
                fetched.failures.insert(repository, e.to_string());
            }
        }
    }

    Ok(fetched)
}
