//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, an in-memory transport for the
//! registry client and a tiny HTTP server for driving the binary end to end.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::MINIMAL);
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use assert_fs::prelude::*;

use docmesh::cache::ManifestCache;
use docmesh::cancel::CancellationToken;
use docmesh::client::{FetchSettings, LinkRegistryClient, Transport};
use docmesh::error::{Error, Result};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{registry_json, InMemoryTransport, StaticServer};
    pub use super::TestFixture;
}

/// Common configuration and navigation snippets for testing.
pub mod configs {
    /// Configuration pointing at a navigation file next to it.
    pub const MINIMAL: &str = r#"
cross_links: [elasticsearch, kibana]
navigation: navigation.yml
"#;

    /// A small global navigation binding two repositories.
    pub const NAVIGATION: &str = r#"
toc:
  - toc: get-started
  - toc: reference
    children:
      - repo: elasticsearch
      - repo: kibana
phantoms:
  - toc: elasticsearch://reference/unused
"#;

    /// Two repositories claiming the same path prefix.
    pub const DUPLICATE_NAVIGATION: &str = r#"
toc:
  - toc: elasticsearch://reference
    path_prefix: reference/shared
  - toc: kibana://reference
    path_prefix: reference/shared/
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "invalid: yaml: content:";
}

/// Build a registry index where each `(repository, branch, etag)` publishes
/// `{repository}/{branch}/links.json`.
pub fn registry_json(entries: &[(&str, &str, &str)]) -> String {
    let mut repositories = serde_json::Map::new();
    for (repository, branch, etag) in entries {
        let entry = serde_json::json!({
            "repository": repository,
            "branch": branch,
            "etag": etag,
            "path": format!("{}/{}/links.json", repository, branch),
            "ref": "0123456789abcdef",
            "updated_at": "2024-05-01T12:00:00Z"
        });
        repositories
            .entry(repository.to_string())
            .or_insert_with(|| serde_json::json!({}))
            .as_object_mut()
            .unwrap()
            .insert(branch.to_string(), entry);
    }
    serde_json::json!({ "repositories": repositories }).to_string()
}

/// A transport serving canned bodies from memory.
///
/// Unknown URLs answer `Error::NotFound`. URLs can be made to fail
/// transiently a number of times before succeeding.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    flaky: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<AtomicUsize>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(self, url: &str, body: &str) -> Self {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    /// Fail the next `times` requests to `url` with a transient error.
    pub fn flaky(self, url: &str, times: usize) -> Self {
        self.flaky.lock().unwrap().insert(url.to_string(), times);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// A client over this transport with no retry delay.
    pub fn client(&self, registry_url: &str, cache: ManifestCache) -> LinkRegistryClient {
        self.client_with(registry_url, cache, CancellationToken::new())
    }

    pub fn client_with(
        &self,
        registry_url: &str,
        cache: ManifestCache,
        cancel: CancellationToken,
    ) -> LinkRegistryClient {
        let settings = FetchSettings {
            timeout: Duration::from_secs(1),
            retries: 2,
            backoff: Duration::ZERO,
        };
        LinkRegistryClient::with_transport(
            Box::new(self.clone()),
            registry_url,
            None,
            cache,
            settings,
            cancel,
        )
        .expect("valid registry url")
    }
}

impl Transport for InMemoryTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());

        if let Some(remaining) = self.flaky.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Network {
                    url: url.to_string(),
                    message: "connection reset by peer".to_string(),
                });
            }
        }

        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                url: url.to_string(),
            })
    }
}

/// A minimal HTTP/1.1 server answering GET requests from a fixed map.
///
/// Runs on a background thread for the lifetime of the test process.
pub struct StaticServer {
    base_url: String,
}

impl StaticServer {
    pub fn start(files: &[(&str, String)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let address = listener.local_addr().expect("test server address");
        let files: HashMap<String, String> = files
            .iter()
            .map(|(path, body)| (format!("/{}", path.trim_start_matches('/')), body.clone()))
            .collect();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut request_line = String::new();
                let mut reader = BufReader::new(&mut stream);
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                // drain headers
                let mut line = String::new();
                while reader.read_line(&mut line).is_ok_and(|n| n > 2) {
                    line.clear();
                }

                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let response = match files.get(path) {
                    Some(body) => format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    ),
                    None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string(),
                };
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self {
            base_url: format!("http://{}", address),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// A test fixture that provides a temporary directory with optional config.
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_config(configs::MINIMAL)
///     .with_file("navigation.yml", configs::NAVIGATION);
///
/// let mut cmd = cargo_bin_cmd!("docmesh");
/// cmd.current_dir(fixture.path())
///     .args(["navigation", "validate"])
///     .assert()
///     .success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `docmesh.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file("docmesh.yaml", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("docmesh.yaml")
    }

    /// Directory used as the manifest cache root.
    pub fn cache_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command for the docmesh binary running inside the fixture, with
    /// colours off and the cache confined to the fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docmesh");
        cmd.current_dir(self.path())
            .env("NO_COLOR", "1")
            .env("DOCMESH_CACHE", self.cache_path())
            .env_remove("DOCMESH_CONFIG")
            .env("NO_PROXY", "127.0.0.1,localhost")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
