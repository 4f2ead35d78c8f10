//! # Links Command Implementation
//!
//! Audits the cross-links repositories have published.
//!
//! ## Subcommands
//!
//! - **`validate`**: Resolve every published cross-link, optionally only
//!   those pointing at (`--to`) or made by (`--from`) one repository.
//! - **`validate-local`**: Replace one repository's published manifest with
//!   a local build and check that every link into it still resolves.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use docmesh::audit::{AuditFilter, AuditSummary, LinkAuditor};
use docmesh::cancel::CancellationToken;
use docmesh::config::BuildConfig;
use docmesh::diagnostics::DiagnosticsCollector;
use docmesh::manifest::Manifest;
use docmesh::output::{emoji, OutputConfig};
use docmesh::phases::{self, fetch, FetchScope, FetchedManifests};
use docmesh::suggestions;

use super::{fetch_progress, finish, ConfigArgs};

/// Audit published cross-links
#[derive(Args, Debug)]
pub struct LinksArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: LinksSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum LinksSubcommand {
    /// Validate published cross-links
    Validate(ValidateArgs),
    /// Validate inbound cross-links against a local manifest
    ValidateLocal(ValidateLocalArgs),
}

/// Arguments for the links validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only validate links pointing into this repository
    #[arg(long, value_name = "REPOSITORY")]
    pub to: Option<String>,

    /// Only validate links made by this repository
    #[arg(long, value_name = "REPOSITORY")]
    pub from: Option<String>,
}

/// Arguments for the links validate-local command
#[derive(Args, Debug)]
pub struct ValidateLocalArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// The repository the local manifest belongs to
    #[arg(value_name = "REPOSITORY")]
    pub repository: String,

    /// The locally built links manifest
    #[arg(value_name = "FILE", default_value = ".artifacts/docs/html/links.json")]
    pub file: PathBuf,
}

/// Execute the `links` command.
pub fn execute(args: LinksArgs, output: &OutputConfig, cancel: CancellationToken) -> Result<()> {
    match args.command {
        LinksSubcommand::Validate(args) => {
            let config = args.config.load()?;
            let manifests = fetch_all(&args.config, &config, cancel)?;
            let filter = AuditFilter {
                links_to: args.to,
                links_from: args.from,
            };
            audit(&config, &manifests, &filter, output)
        }
        LinksSubcommand::ValidateLocal(args) => {
            let config = args.config.load()?;
            if !args.file.exists() {
                return Err(suggestions::local_manifest_not_found(&args.file));
            }
            let local = Manifest::from_file(&args.repository, &args.file)?;
            let manifests =
                fetch_all(&args.config, &config, cancel)?.with_manifest(&args.repository, local);
            let filter = AuditFilter {
                links_to: Some(args.repository),
                links_from: None,
            };
            audit(&config, &manifests, &filter, output)
        }
    }
}

fn fetch_all(
    args: &ConfigArgs,
    config: &BuildConfig,
    cancel: CancellationToken,
) -> Result<FetchedManifests> {
    let client = args.client(config, cancel)?;
    let progress = fetch_progress();
    let manifests = fetch::execute(
        &client,
        &config.cross_links,
        &config.fetch_options(FetchScope::All),
        &|_| progress.inc(1),
    );
    progress.finish_and_clear();
    Ok(manifests?)
}

fn audit(
    config: &BuildConfig,
    manifests: &FetchedManifests,
    filter: &AuditFilter,
    output: &OutputConfig,
) -> Result<()> {
    let navigation = match config.navigation {
        Some(_) => Some(phases::load_navigation(config)?),
        None => None,
    };
    let url_builder = config.environment.url_builder()?;
    let auditor = LinkAuditor::new(
        manifests,
        navigation.as_ref().map(|n| &n.assembled.prefix_index),
        url_builder.as_ref(),
    );

    let collector = DiagnosticsCollector::new(config.strict);
    let AuditSummary {
        repositories,
        checked,
        broken,
    } = auditor.audit(filter, &collector);
    println!(
        "{} Checked {} cross-link(s) from {} repositories: {} broken",
        emoji(output, "🔗", "[LINKS]"),
        checked,
        repositories,
        broken
    );
    finish(output, &collector)
}
