//! # Navigation Command Implementation
//!
//! ## Subcommands
//!
//! - **`validate`**: Parse the navigation declaration and build the prefix
//!   index. Duplicate path prefixes and duplicate sources fail the command.
//! - **`tree`**: Print the declaration as a tree of `source -> path_prefix`.
//! - **`validate-link-reference`**: Check a locally built manifest against
//!   the global navigation before it is published: its links must not live
//!   in folders reserved for another repository, and once it replaces the
//!   published manifest no global path may be claimed twice.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use ptree::{print_tree, TreeItem};

use docmesh::cancel::CancellationToken;
use docmesh::manifest::Manifest;
use docmesh::navigation::NavNode;
use docmesh::output::{emoji, format_collisions, format_violations, OutputConfig};
use docmesh::phases::{self, LocalManifest};
use docmesh::suggestions;

use super::{fetch_progress, ConfigArgs};

/// Where a documentation build writes its manifest.
const LOCAL_MANIFEST: &str = ".artifacts/docs/html/links.json";

/// Validate and inspect the global navigation
#[derive(Args, Debug)]
pub struct NavigationArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: NavigationSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum NavigationSubcommand {
    /// Build the prefix index and report duplicates
    Validate(ValidateArgs),
    /// Print the navigation declaration as a tree
    Tree(TreeArgs),
    /// Validate a local links manifest against the global navigation
    ValidateLinkReference(LinkReferenceArgs),
}

/// Arguments for the navigation validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the navigation tree command
#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the top-level entries.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Arguments for the navigation validate-link-reference command
#[derive(Args, Debug)]
pub struct LinkReferenceArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// The locally built links manifest
    #[arg(value_name = "FILE", default_value = LOCAL_MANIFEST)]
    pub file: PathBuf,

    /// The repository the manifest belongs to. Defaults to the manifest's
    /// recorded origin.
    #[arg(long, value_name = "NAME")]
    pub repository: Option<String>,
}

/// Execute the `navigation` command.
pub fn execute(args: NavigationArgs, output: &OutputConfig, cancel: CancellationToken) -> Result<()> {
    match args.command {
        NavigationSubcommand::Validate(args) => execute_validate(args, output),
        NavigationSubcommand::Tree(args) => execute_tree(args),
        NavigationSubcommand::ValidateLinkReference(args) => {
            execute_link_reference(args, output, cancel)
        }
    }
}

fn execute_validate(args: ValidateArgs, output: &OutputConfig) -> Result<()> {
    let config = args.config.load()?;
    println!(
        "{} Validating navigation: {}",
        emoji(output, "🔍", "[SCAN]"),
        config.navigation_path()?.display()
    );

    let navigation = phases::load_navigation(&config)?;
    println!(
        "{} Navigation is valid: {} path prefix(es), {} phantom(s), {} placed document(s)",
        emoji(output, "✅", "[OK]"),
        navigation.assembled.prefix_index.len(),
        navigation.declaration.phantoms.len(),
        navigation.assembled.documents.len()
    );
    Ok(())
}

fn execute_tree(args: TreeArgs) -> Result<()> {
    let config = args.config.load()?;
    let navigation = phases::load_navigation(&config)?;

    let max_depth = args.depth.unwrap_or(usize::MAX);
    let root = TreeNode {
        label: config.navigation_path()?.display().to_string(),
        children: navigation
            .declaration
            .nodes
            .iter()
            .map(|node| build_tree_node(node, max_depth, 0))
            .collect(),
    };
    print_tree(&root).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}

fn execute_link_reference(
    args: LinkReferenceArgs,
    output: &OutputConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let config = args.config.load()?;
    if !args.file.exists() {
        return Err(suggestions::local_manifest_not_found(&args.file));
    }
    let local = load_local_manifest(&args.file, args.repository.as_deref())?;
    println!(
        "{} Validating {} as '{}'",
        emoji(output, "🔍", "[SCAN]"),
        args.file.display(),
        local.repository
    );

    let client = args.config.client(&config, cancel)?;
    let progress = fetch_progress();
    let report = phases::execute_check(&config, &client, Some(local), &|_| progress.inc(1));
    progress.finish_and_clear();
    let report = report?;

    print!("{}", format_violations(output, &report.namespace_violations));
    print!("{}", format_collisions(output, &report.collisions));

    let problems = report.namespace_violations.len() + report.collisions.len();
    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!(
        "{} No namespace violations or collisions",
        emoji(output, "✅", "[OK]")
    );
    Ok(())
}

/// Read a local manifest, naming it after `repository` or its recorded origin.
fn load_local_manifest(path: &Path, repository: Option<&str>) -> Result<LocalManifest> {
    let name = repository.unwrap_or("local");
    let manifest = Manifest::from_file(name, path)?;
    let repository = match repository {
        Some(repository) => repository.to_string(),
        None => manifest
            .origin()
            .and_then(origin_repository)
            .ok_or_else(|| suggestions::repository_not_named(path))?,
    };
    Ok(LocalManifest {
        repository,
        manifest,
    })
}

/// `name`, or the last segment of the remote (`elastic/kibana.git` -> `kibana`).
fn origin_repository(origin: &docmesh::manifest::Origin) -> Option<String> {
    if let Some(name) = origin.name.as_deref().filter(|n| !n.is_empty()) {
        return Some(name.to_string());
    }
    origin
        .remote
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .map(|segment| segment.trim_end_matches(".git"))
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn build_tree_node(node: &NavNode, max_depth: usize, current_depth: usize) -> TreeNode {
    let label = format!("{} -> {}", node.source, node.path_prefix);
    if current_depth >= max_depth || node.children.is_empty() {
        TreeNode {
            label,
            children: vec![],
        }
    } else {
        let children = node
            .children
            .iter()
            .map(|child| build_tree_node(child, max_depth, current_depth + 1))
            .collect();
        TreeNode { label, children }
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
