//! # Link Registry Client
//!
//! This module provides the `LinkRegistryClient`, which fetches the global
//! registry index and individual repository manifests.
//!
//! ## Design
//!
//! Network access goes through the [`Transport`] trait so tests can replace
//! it with an in-memory implementation:
//!
//! - **`HttpTransport`**: a blocking `reqwest` client with a short per-call
//!   timeout, used by the CLI.
//! - Test transports serve canned bytes and count calls.
//!
//! The registry index is fetched once and memoized. Manifests are looked up
//! in the [`ManifestCache`] by content tag first; only a miss goes to the
//! network, and the fetched bytes are written back.
//!
//! Transient transport failures are retried a bounded number of times with
//! a doubling delay. "Not found" and other definitive answers are never
//! retried. Every attempt checks the [`CancellationToken`] first, and a
//! response that arrives after cancellation is discarded.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use url::Url;

use crate::cache::{CacheKey, ManifestCache};
use crate::cancel::CancellationToken;
use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::registry::{LinkRegistry, RegistryEntry};

/// Trait for network access - allows mocking in tests
pub trait Transport: Send + Sync {
    /// Fetch the body at `url`.
    ///
    /// Implementations report a missing resource as `Error::NotFound`, a
    /// retryable failure as `Error::Network` and any other definitive
    /// failure as `Error::HttpStatus`.
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docmesh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                url: url.to_string(),
            });
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("server responded with {}", status),
            });
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

/// Retry and timeout settings for network fetches
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry; doubled on each further attempt
    pub backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECS),
            retries: defaults::FETCH_RETRIES,
            backoff: Duration::from_millis(defaults::FETCH_BACKOFF_MILLIS),
        }
    }
}

/// Fetches the registry index and repository manifests.
pub struct LinkRegistryClient {
    transport: Box<dyn Transport>,
    cache: ManifestCache,
    registry_url: Url,
    manifest_base: Url,
    settings: FetchSettings,
    cancel: CancellationToken,
    registry: Mutex<Option<Arc<LinkRegistry>>>,
}

impl LinkRegistryClient {
    /// Create a client that talks HTTP to `registry_url`.
    ///
    /// Relative manifest locations are resolved against `manifest_base`, or
    /// against the registry URL when no base is given.
    pub fn new(
        registry_url: &str,
        manifest_base: Option<&str>,
        cache: ManifestCache,
        settings: FetchSettings,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let transport = HttpTransport::new(settings.timeout)?;
        Self::with_transport(
            Box::new(transport),
            registry_url,
            manifest_base,
            cache,
            settings,
            cancel,
        )
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        registry_url: &str,
        manifest_base: Option<&str>,
        cache: ManifestCache,
        settings: FetchSettings,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let registry_url = Url::parse(registry_url)?;
        let manifest_base = match manifest_base {
            Some(base) if base.ends_with('/') => Url::parse(base)?,
            Some(base) => Url::parse(&format!("{}/", base))?,
            None => registry_url.clone(),
        };
        Ok(Self {
            transport,
            cache,
            registry_url,
            manifest_base,
            settings,
            cancel,
            registry: Mutex::new(None),
        })
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetch the registry index, once per client.
    pub fn fetch_registry(&self) -> Result<Arc<LinkRegistry>> {
        let mut memo = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(registry) = memo.as_ref() {
            return Ok(Arc::clone(registry));
        }

        info!("Fetching link registry from {}", self.registry_url);
        let bytes = self.get_with_retry(self.registry_url.as_str())?;
        let registry = Arc::new(LinkRegistry::from_slice(&bytes)?);
        *memo = Some(Arc::clone(&registry));
        Ok(registry)
    }

    /// URL a registry entry's manifest is fetched from.
    pub fn manifest_url(&self, entry: &RegistryEntry) -> Result<Url> {
        Ok(self.manifest_base.join(&entry.manifest_location)?)
    }

    /// Fetch the manifest for `entry`, consulting the cache first.
    pub fn fetch_manifest(&self, entry: &RegistryEntry) -> Result<Manifest> {
        let key = CacheKey::from(entry);
        if let Some(bytes) = self.cache.get(&key) {
            return Manifest::from_slice(&entry.repository, &bytes);
        }

        let url = self.manifest_url(entry)?;
        debug!("Fetching manifest for {} from {}", entry.repository, url);
        let bytes = self.get_with_retry(url.as_str())?;
        let manifest = Manifest::from_slice(&entry.repository, &bytes)?;
        self.cache.put(&key, bytes);
        Ok(manifest)
    }

    fn get_with_retry(&self, url: &str) -> Result<Vec<u8>> {
        let mut delay = self.settings.backoff;
        let mut attempt = 0;
        loop {
            self.cancel.check(url)?;
            match self.transport.get(url) {
                Ok(bytes) => {
                    // a response that arrives after cancellation is abandoned
                    self.cancel.check(url)?;
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempt < self.settings.retries => {
                    attempt += 1;
                    warn!(
                        "Transient failure fetching {} (attempt {}/{}): {}",
                        url,
                        attempt,
                        self.settings.retries + 1,
                        e
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                        delay *= 2;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
