//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `docmesh`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic.
//!
//! Commands that need the build configuration flatten [`ConfigArgs`] into
//! their arguments and use it to build a registry client.

pub mod cache;
pub mod check;
pub mod completions;
pub mod links;
pub mod navigation;
pub mod registry;
pub mod resolve;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use docmesh::cache::ManifestCache;
use docmesh::cancel::CancellationToken;
use docmesh::client::LinkRegistryClient;
use docmesh::config::{self, BuildConfig};
use docmesh::defaults;
use docmesh::diagnostics::DiagnosticsCollector;
use docmesh::output::{format_diagnostic, OutputConfig};
use docmesh::suggestions;

/// Options shared by every command that reads `docmesh.yaml`.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the docmesh.yaml configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "DOCMESH_CONFIG",
        default_value = defaults::CONFIG_FILE
    )]
    pub config: PathBuf,

    /// The root directory for the manifest cache.
    ///
    /// Defaults to the system cache directory (`~/.cache/docmesh` on Linux,
    /// `~/Library/Caches/docmesh` on macOS).
    /// Can also be set with the `DOCMESH_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "DOCMESH_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Treat warnings (unpublished repositories, fetch failures) as errors.
    #[arg(long)]
    pub strict: bool,
}

impl ConfigArgs {
    /// Load and validate the configuration file.
    pub fn load(&self) -> Result<BuildConfig> {
        if !self.config.exists() {
            return Err(suggestions::config_not_found(&self.config));
        }
        let mut config = config::from_file(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))?;
        config.strict |= self.strict;
        Ok(config)
    }

    pub fn cache_root(&self) -> PathBuf {
        self.cache_root
            .clone()
            .unwrap_or_else(defaults::default_cache_root)
    }

    /// Build a registry client over HTTP with a disk-backed cache.
    pub fn client(&self, config: &BuildConfig, cancel: CancellationToken) -> Result<LinkRegistryClient> {
        let client = LinkRegistryClient::new(
            &config.registry.url,
            config.registry.manifest_base_url.as_deref(),
            ManifestCache::with_disk_root(self.cache_root()),
            config.fetch_settings(),
            cancel,
        )?;
        Ok(client)
    }
}

/// A spinner that counts fetched manifests. Hidden when stderr is not a terminal.
pub fn fetch_progress() -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{pos} fetched]") {
        progress.set_style(style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress.set_message("Fetching manifests");
    progress
}

/// Print every collected diagnostic and fail if the build should fail.
pub fn finish(output: &OutputConfig, collector: &DiagnosticsCollector) -> Result<()> {
    for diagnostic in collector.diagnostics() {
        println!("{}", format_diagnostic(output, &diagnostic));
    }
    if collector.has_failures() {
        return Err(suggestions::diagnostics_failed(
            collector.error_count(),
            collector.warning_count(),
            collector.is_strict(),
        ));
    }
    Ok(())
}
