//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::warn;

use docmesh::cancel::CancellationToken;
use docmesh::output::OutputConfig;

use crate::commands;

/// docmesh - Resolve cross-repository links and assemble global navigation
#[derive(Parser, Debug)]
#[command(name = "docmesh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve cross-links to URLs
    Resolve(commands::resolve::ResolveArgs),

    /// Validate and inspect the global navigation
    Navigation(commands::navigation::NavigationArgs),

    /// Fetch every manifest, assemble navigation and check for collisions
    Check(commands::check::CheckArgs),

    /// Audit published cross-links
    Links(commands::links::LinksArgs),

    /// Inspect the link registry
    Registry(commands::registry::RegistryArgs),

    /// Manage the manifest cache
    Cache(commands::cache::CacheArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);
        let output = OutputConfig::from_env_and_flag(&self.color);
        let cancel = CancellationToken::new();
        install_interrupt_handler(&cancel);

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args, &output, cancel),
            Commands::Navigation(args) => commands::navigation::execute(args, &output, cancel),
            Commands::Check(args) => commands::check::execute(args, &output, cancel),
            Commands::Links(args) => commands::links::execute(args, &output, cancel),
            Commands::Registry(args) => commands::registry::execute(args, cancel),
            Commands::Cache(args) => commands::cache::execute(args, &output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Install `env_logger` at `level`. `RUST_LOG`, when set, takes precedence.
fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder
        .parse_filters(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false);
    // a logger may already be installed when running under a test harness
    let _ = builder.try_init();
}

/// Ctrl-C cancels in-flight fetches instead of killing the process.
fn install_interrupt_handler(cancel: &CancellationToken) {
    let token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("failed to set Ctrl+C handler: {}", e);
    }
}
