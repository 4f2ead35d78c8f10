//! # Check Command Implementation
//!
//! Runs the complete pipeline over the published state of every repository:
//! the navigation declaration is assembled into a prefix index, every
//! navigated or declared repository's manifest is fetched, and every
//! published document is replayed through the index to find global paths
//! claimed by more than one repository.
//!
//! This command is a safe, read-only operation apart from filling the
//! manifest cache.

use anyhow::Result;
use clap::Args;

use docmesh::cancel::CancellationToken;
use docmesh::diagnostics::DiagnosticsCollector;
use docmesh::output::{emoji, format_collisions, OutputConfig};
use docmesh::phases;

use super::{fetch_progress, ConfigArgs};

/// Fetch every manifest, assemble navigation and check for collisions
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print collisions as JSON instead of a report
    #[arg(long)]
    pub json: bool,
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, output: &OutputConfig, cancel: CancellationToken) -> Result<()> {
    let config = args.config.load()?;
    let client = args.config.client(&config, cancel)?;

    let progress = fetch_progress();
    let report = phases::execute_check(&config, &client, None, &|_| progress.inc(1));
    progress.finish_and_clear();
    let report = report?;

    let collector = DiagnosticsCollector::new(config.strict);
    for (repository, message) in report.manifests.failures() {
        if config.strict {
            collector.emit_error(repository, message.as_str());
        } else {
            collector.emit_warning(repository, message.as_str());
        }
    }
    for collision in &report.collisions {
        collector.emit_error(&collision.second, collision.to_string());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.collisions)?);
    } else {
        for (repository, message) in report.manifests.failures() {
            println!("{} {}: {}", emoji(output, "⚠️ ", "[WARN]"), repository, message);
        }
        print!("{}", format_collisions(output, &report.collisions));
        println!(
            "{} Checked {} manifest(s) against {} path prefix(es): {} collision(s)",
            emoji(output, "📦", "[CHECK]"),
            report.manifests.len(),
            report.navigation.assembled.prefix_index.len(),
            report.collisions.len()
        );
    }

    if collector.has_failures() {
        return Err(docmesh::suggestions::diagnostics_failed(
            collector.error_count(),
            collector.warning_count(),
            collector.is_strict(),
        ));
    }
    Ok(())
}
