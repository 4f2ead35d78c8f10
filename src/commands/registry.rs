//! # Registry Command Implementation
//!
//! Prints the entries of the link registry: for every repository and
//! branch, the content tag, manifest location, git ref and update time.

use anyhow::Result;
use clap::{Args, Subcommand};

use docmesh::cancel::CancellationToken;
use docmesh::suggestions;

use super::ConfigArgs;

/// Inspect the link registry
#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: RegistrySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RegistrySubcommand {
    /// Show registry entries
    Show(ShowArgs),
}

/// Arguments for the registry show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only show this repository
    #[arg(long, value_name = "NAME")]
    pub repository: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Execute the `registry` command.
pub fn execute(args: RegistryArgs, cancel: CancellationToken) -> Result<()> {
    match args.command {
        RegistrySubcommand::Show(args) => execute_show(args, cancel),
    }
}

fn execute_show(args: ShowArgs, cancel: CancellationToken) -> Result<()> {
    let config = args.config.load()?;
    let client = args.config.client(&config, cancel)?;
    let registry = client.fetch_registry()?;

    if let Some(repository) = &args.repository {
        if !registry.contains(repository) {
            let names: Vec<&str> = registry.repository_names().collect();
            return Err(suggestions::unknown_repository(repository, &names));
        }
    }

    let entries: Vec<_> = registry
        .repositories
        .iter()
        .filter(|(name, _)| {
            args.repository
                .as_deref()
                .map_or(true, |wanted| wanted.eq_ignore_ascii_case(name))
        })
        .flat_map(|(_, branches)| branches.values())
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("The registry at {} is empty.", config.registry.url);
        return Ok(());
    }

    println!(
        "{:<24} {:<12} {:<14} {:<20} {}",
        "REPOSITORY", "BRANCH", "REF", "UPDATED", "MANIFEST"
    );
    for entry in entries {
        let updated = entry
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<24} {:<12} {:<14} {:<20} {}",
            entry.repository,
            entry.branch,
            entry.git_ref.chars().take(12).collect::<String>(),
            updated,
            entry.manifest_location
        );
    }
    Ok(())
}
