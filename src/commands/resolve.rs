//! # Resolve Command Implementation
//!
//! Resolves one or more `repository://path#anchor` cross-links against the
//! published manifests and prints the URL each one points to in the
//! configured environment. When the configuration names a navigation file,
//! output paths are mapped through the global navigation first.

use anyhow::Result;
use clap::Args;

use docmesh::cancel::CancellationToken;
use docmesh::diagnostics::DiagnosticsCollector;
use docmesh::output::{emoji, OutputConfig};
use docmesh::phases::{self, fetch, FetchScope};
use docmesh::resolver::{CrossLinkReference, CrossLinkResolver};

use super::{fetch_progress, finish, ConfigArgs};

/// Resolve cross-links to URLs
#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Cross-links to resolve, e.g. `kibana://guide/intro.md#setup`
    #[arg(required = true, value_name = "URI")]
    pub uris: Vec<String>,

    /// Resolve against every repository in the registry, not only the
    /// declared `cross_links`
    #[arg(long)]
    pub all_repositories: bool,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, output: &OutputConfig, cancel: CancellationToken) -> Result<()> {
    let config = args.config.load()?;
    let collector = DiagnosticsCollector::new(config.strict);

    let mut references = Vec::new();
    for uri in &args.uris {
        match CrossLinkReference::parse(uri) {
            Ok(reference) => references.push((uri, reference)),
            Err(e) => collector.emit_error(uri, e.to_string()),
        }
    }

    let navigation = match config.navigation {
        Some(_) => Some(phases::load_navigation(&config)?),
        None => None,
    };

    let client = args.config.client(&config, cancel)?;
    let scope = if args.all_repositories {
        FetchScope::All
    } else {
        FetchScope::Declared
    };
    let progress = fetch_progress();
    let manifests = fetch::execute(
        &client,
        &config.cross_links,
        &config.fetch_options(scope),
        &|_| progress.inc(1),
    );
    progress.finish_and_clear();
    let manifests = manifests?;

    let url_builder = config.environment.url_builder()?;
    let resolver = CrossLinkResolver::new(
        &manifests,
        navigation.as_ref().map(|n| &n.assembled.prefix_index),
        url_builder.as_ref(),
    );

    for (uri, reference) in &references {
        match resolver.resolve(reference) {
            Ok(resolved) => println!("{} {} -> {}", emoji(output, "🔗", "[OK]"), uri, resolved.url),
            Err(failure) => collector.emit_resolution(uri, None, &failure),
        }
    }

    finish(output, &collector)
}
