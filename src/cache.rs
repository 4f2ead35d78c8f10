//! Content-addressed caching of fetched manifests
//!
//! Entries are keyed by `(repository, branch, content tag)`. A manifest is
//! immutable once published under a tag, so a hit never needs revalidation
//! and concurrent writers for the same key always write identical bytes.
//!
//! The in-process map lives for the lifetime of the cache. When a disk root
//! is configured, entries are also persisted as
//! `links-{repository}-{branch}-{tag}.json`, each component percent-encoded,
//! so later builds can reuse them.
//! Disk failures are logged and otherwise ignored.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::path::{decode_path_component, encode_path_component};
use crate::registry::RegistryEntry;

/// File name prefix of persisted manifests.
pub const CACHE_FILE_PREFIX: &str = "links-";

/// Cache key combining repository, branch and content tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub repository: String,
    pub branch: String,
    pub content_tag: String,
}

impl CacheKey {
    pub fn new(repository: &str, branch: &str, content_tag: &str) -> Self {
        Self {
            repository: repository.to_string(),
            branch: branch.to_string(),
            content_tag: content_tag.to_string(),
        }
    }

    /// Deterministic file name for this key.
    pub fn file_name(&self) -> String {
        format!(
            "{}{}-{}-{}.json",
            CACHE_FILE_PREFIX,
            encode_path_component(&self.repository),
            encode_path_component(&self.branch),
            encode_path_component(&self.content_tag)
        )
    }

    /// Recover the key from a file name written by [`file_name`].
    ///
    /// [`file_name`]: CacheKey::file_name
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix(CACHE_FILE_PREFIX)?.strip_suffix(".json")?;
        let mut parts = stem.split('-');
        let (repository, branch, content_tag) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || repository.is_empty() || branch.is_empty() {
            return None;
        }
        Some(CacheKey {
            repository: decode_path_component(repository)?,
            branch: decode_path_component(branch)?,
            content_tag: decode_path_component(content_tag)?,
        })
    }
}

impl From<&RegistryEntry> for CacheKey {
    fn from(entry: &RegistryEntry) -> Self {
        CacheKey::new(&entry.repository, &entry.branch, &entry.content_tag)
    }
}

/// Cache of raw manifest bytes
#[derive(Debug, Clone, Default)]
pub struct ManifestCache {
    entries: Arc<Mutex<HashMap<CacheKey, Arc<Vec<u8>>>>>,
    disk_root: Option<PathBuf>,
}

impl ManifestCache {
    /// Create an in-process cache with no disk persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that also persists entries under `root`
    pub fn with_disk_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            entries: Arc::default(),
            disk_root: Some(root.into()),
        }
    }

    pub fn disk_root(&self) -> Option<&Path> {
        self.disk_root.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Vec<u8>>>> {
        // values are never mutated after insertion
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the bytes cached for `key`, consulting disk on an in-process miss
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        if let Some(bytes) = self.lock().get(key) {
            debug!("cache hit for {}@{} ({})", key.repository, key.branch, key.content_tag);
            return Some(Arc::clone(bytes));
        }

        let path = self.disk_root.as_ref()?.join(key.file_name());
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("disk cache hit: {}", path.display());
                let bytes = Arc::new(bytes);
                let stored = Arc::clone(
                    self.lock()
                        .entry(key.clone())
                        .or_insert_with(|| Arc::clone(&bytes)),
                );
                Some(stored)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read cached manifest {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Store `bytes` under `key`.
    ///
    /// The first write for a key wins. A failure to persist to disk is
    /// logged and the entry stays available in-process.
    pub fn put(&self, key: &CacheKey, bytes: Vec<u8>) {
        let inserted = {
            let mut entries = self.lock();
            if entries.contains_key(key) {
                false
            } else {
                entries.insert(key.clone(), Arc::new(bytes.clone()));
                true
            }
        };

        if !inserted {
            return;
        }

        if let Some(root) = &self.disk_root {
            if let Err(e) = write_entry(root, key, &bytes) {
                warn!(
                    "Failed to write manifest cache for '{}' to {}: {}",
                    key.repository,
                    root.display(),
                    e
                );
            }
        }
    }

    /// Check if a key exists in the in-process cache
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Get the number of in-process entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the in-process cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clear all in-process entries. Files on disk are left alone.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

fn write_entry(root: &Path, key: &CacheKey, bytes: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(root)?;
    let path = root.join(key.file_name());
    // readers must never observe a partially written file
    let tmp = root.join(format!(".{}.{}.tmp", key.file_name(), std::process::id()));
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &path)
}
