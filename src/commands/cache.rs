//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which manages the manifests
//! persisted under the cache root as `links-{repository}-{branch}-{tag}.json`.
//!
//! ## Subcommands
//!
//! - **`list`**: Display all cached manifests
//! - **`clean`**: Remove cached manifests based on filters (--all, --repository, --older-than)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use walkdir::WalkDir;

use docmesh::cache::CacheKey;
use docmesh::defaults;
use docmesh::output::{emoji, OutputConfig};

/// Manage the manifest cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The root directory for the manifest cache.
    ///
    /// If not provided, it defaults to the system's cache directory
    /// (e.g., `~/.cache/docmesh` on Linux).
    /// Can also be set with the `DOCMESH_CACHE` environment variable.
    #[arg(long, value_name = "DIR", env = "DOCMESH_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List all cached manifests
    List(ListArgs),
    /// Clean cached manifests
    Clean(CleanArgs),
}

/// Arguments for the cache list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Delete all cached manifests
    #[arg(long)]
    pub all: bool,

    /// Delete every cached manifest of this repository
    #[arg(long, value_name = "NAME")]
    pub repository: Option<String>,

    /// Delete entries older than the specified duration
    ///
    /// Duration format: number followed by unit (s, m, h, d, w)
    /// Examples: "30d", "7d", "1h", "30m", "2w"
    #[arg(long, value_name = "DURATION")]
    pub older_than: Option<String>,

    /// Skip confirmation prompt and delete immediately
    #[arg(long)]
    pub yes: bool,
}

/// One persisted manifest.
#[derive(Debug, Clone, serde::Serialize)]
struct CacheEntry {
    repository: String,
    branch: String,
    content_tag: String,
    size: u64,
    #[serde(skip)]
    last_modified: Option<SystemTime>,
    #[serde(rename = "path")]
    file_path: PathBuf,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, output: &OutputConfig) -> Result<()> {
    let cache_root = args
        .cache_root
        .unwrap_or_else(defaults::default_cache_root);
    match args.command {
        CacheSubcommand::List(list_args) => execute_list(&cache_root, list_args),
        CacheSubcommand::Clean(clean_args) => execute_clean(&cache_root, clean_args, output),
    }
}

fn execute_list(cache_root: &Path, args: ListArgs) -> Result<()> {
    if !cache_root.exists() {
        if args.json {
            println!("[]");
        } else {
            println!("Cache directory does not exist: {}", cache_root.display());
            println!("No cached manifests found.");
        }
        return Ok(());
    }

    let entries = scan_cache_directory(cache_root)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No cached manifests found in: {}", cache_root.display());
        return Ok(());
    }

    println!("Cached manifests:\n");
    println!("{:<24} {:<16} {:<24} {:>12}", "REPOSITORY", "BRANCH", "TAG", "SIZE");
    println!("{}", "-".repeat(79));
    for entry in &entries {
        println!(
            "{:<24} {:<16} {:<24} {:>12}",
            truncate(&entry.repository, 24),
            truncate(&entry.branch, 16),
            truncate(&entry.content_tag, 24),
            format_size(entry.size)
        );
    }
    let total: u64 = entries.iter().map(|e| e.size).sum();
    println!(
        "\nTotal: {} cached manifests ({})",
        entries.len(),
        format_size(total)
    );
    Ok(())
}

fn execute_clean(cache_root: &Path, args: CleanArgs, output: &OutputConfig) -> Result<()> {
    if !args.all && args.repository.is_none() && args.older_than.is_none() {
        return Err(docmesh::suggestions::cache_clean_no_filter());
    }

    let older_than = args
        .older_than
        .as_deref()
        .map(|duration| {
            parse_duration(duration).with_context(|| {
                format!("Invalid duration format: '{}'. Expected format: number followed by unit (s, m, h, d, w)", duration)
            })
        })
        .transpose()?;

    if !cache_root.exists() {
        println!("Cache directory does not exist: {}", cache_root.display());
        println!("No cached manifests to clean.");
        return Ok(());
    }

    let entries = scan_cache_directory(cache_root)?;
    let to_delete = filter_entries_for_cleanup(&entries, &args, older_than, SystemTime::now());

    if to_delete.is_empty() {
        println!("No cache entries match the specified criteria.");
        return Ok(());
    }

    println!("Cache entries to be deleted:\n");
    for entry in &to_delete {
        println!(
            "  {} {} {} ({})",
            entry.repository,
            entry.branch,
            truncate(&entry.content_tag, 16),
            format_size(entry.size)
        );
    }
    let total: u64 = to_delete.iter().map(|e| e.size).sum();
    println!("\nTotal: {} entries ({})", to_delete.len(), format_size(total));

    if args.dry_run {
        println!(
            "\n{} Dry run mode - no changes were made.",
            emoji(output, "🔎", "[DRY RUN]")
        );
        return Ok(());
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Do you want to delete these cache entries?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Clean cancelled.");
            return Ok(());
        }
    }

    let mut deleted = 0;
    let mut failed = 0;
    for entry in &to_delete {
        match fs::remove_file(&entry.file_path) {
            Ok(()) => deleted += 1,
            Err(e) => {
                failed += 1;
                eprintln!(
                    "  {} Failed to delete {}: {}",
                    emoji(output, "❌", "[FAIL]"),
                    entry.file_path.display(),
                    e
                );
            }
        }
    }

    if deleted > 0 {
        println!(
            "\n{} Successfully deleted {} cache entries.",
            emoji(output, "✅", "[OK]"),
            deleted
        );
    }
    if failed > 0 {
        anyhow::bail!("Failed to delete {} cache entries", failed);
    }
    Ok(())
}

/// Select the entries matching any of the requested filters.
fn filter_entries_for_cleanup(
    entries: &[CacheEntry],
    args: &CleanArgs,
    older_than: Option<Duration>,
    now: SystemTime,
) -> Vec<CacheEntry> {
    let repository = args.repository.as_deref().map(str::trim);
    entries
        .iter()
        .filter(|entry| {
            if args.all {
                return true;
            }
            let by_repository = repository
                .as_deref()
                .is_some_and(|name| entry.repository.eq_ignore_ascii_case(name));
            let by_age = older_than.is_some_and(|threshold| match entry.last_modified {
                Some(modified) => now
                    .duration_since(modified)
                    .map_or(true, |age| age >= threshold),
                // unknown age counts as old
                None => true,
            });
            by_repository || by_age
        })
        .cloned()
        .collect()
}

/// Parse a duration string into a Duration
///
/// Format: number followed by unit (s, m, h, d, w)
/// Examples: "30d", "7d", "1h", "30m", "2w"
fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    if duration_str.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let split_idx = duration_str
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map_or(duration_str.len(), |(i, _)| i);

    if split_idx == 0 {
        return Err(anyhow::anyhow!("Duration must start with a number"));
    }

    let (number_str, unit_str) = duration_str.split_at(split_idx);
    let number: f64 = number_str
        .parse()
        .with_context(|| format!("Invalid number in duration: '{}'", number_str))?;

    let seconds = match unit_str {
        "s" | "sec" | "second" | "seconds" => number,
        "m" | "min" | "minute" | "minutes" => number * 60.0,
        "h" | "hr" | "hour" | "hours" => number * 3600.0,
        "d" | "day" | "days" => number * 86400.0,
        "w" | "week" | "weeks" => number * 604800.0,
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid duration unit: '{}'. Valid units: s, m, h, d, w",
                unit_str
            ));
        }
    };

    Ok(Duration::from_secs(seconds as u64))
}

/// Find every persisted manifest directly under `cache_root`.
fn scan_cache_directory(cache_root: &Path) -> Result<Vec<CacheEntry>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(cache_root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(key) = entry.file_name().to_str().and_then(CacheKey::parse_file_name) else {
            continue;
        };
        let metadata = entry.metadata()?;
        entries.push(CacheEntry {
            repository: key.repository,
            branch: key.branch,
            content_tag: key.content_tag,
            size: metadata.len(),
            last_modified: metadata.modified().ok(),
            file_path: entry.into_path(),
        });
    }

    entries.sort_by(|a, b| {
        a.repository
            .cmp(&b.repository)
            .then_with(|| a.branch.cmp(&b.branch))
            .then_with(|| a.content_tag.cmp(&b.content_tag))
    });
    Ok(entries)
}

fn truncate(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

/// Format size in human-readable format
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
