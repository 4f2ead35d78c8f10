//! Orchestrator for the complete check pipeline
//!
//! This module coordinates the phases of a build check:
//! 1. Navigation - parse the declaration and assemble the prefix index.
//!    Duplicate path prefixes abort here, before anything is fetched.
//! 2. Fetch - load the manifests of every declared or navigated repository.
//! 3. Consistency - replay every manifest through the prefix index.

use std::collections::BTreeSet;

use log::info;

use super::fetch::{self, FetchScope, FetchedManifests};
use crate::client::LinkRegistryClient;
use crate::config::BuildConfig;
use crate::consistency::{self, CollisionError, NamespaceViolation, PhantomSet};
use crate::error::Result;
use crate::manifest::Manifest;
use crate::navigation::{
    AssembledNavigation, NavigationAssembler, NavigationDeclaration, TocTrees,
};

/// A locally built manifest that replaces one repository's published one.
#[derive(Debug, Clone)]
pub struct LocalManifest {
    pub repository: String,
    pub manifest: Manifest,
}

/// The parsed declaration together with its assembly.
#[derive(Debug, Clone)]
pub struct LoadedNavigation {
    pub declaration: NavigationDeclaration,
    pub assembled: AssembledNavigation,
}

impl LoadedNavigation {
    /// Every repository a navigation node binds.
    pub fn repositories(&self) -> BTreeSet<String> {
        self.declaration
            .walk()
            .into_iter()
            .map(|(_, node)| node.source.scheme().to_string())
            .collect()
    }

    /// Phantoms declared in the navigation plus `extra`.
    pub fn phantoms(&self, extra: &[String]) -> PhantomSet {
        let mut phantoms: PhantomSet = extra.iter().collect();
        for source in &self.declaration.phantoms {
            phantoms.insert_source(source);
        }
        phantoms
    }
}

/// Outcome of [`execute_check`].
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub navigation: LoadedNavigation,
    pub manifests: FetchedManifests,
    pub collisions: Vec<CollisionError>,
    /// Only populated when a local manifest was supplied.
    pub namespace_violations: Vec<NamespaceViolation>,
}

/// Phase 1: parse and assemble the configured navigation.
pub fn load_navigation(config: &BuildConfig) -> Result<LoadedNavigation> {
    let path = config.navigation_path()?;
    let declaration = NavigationDeclaration::from_file(path, &config.navigation_options())?;
    let trees = match &config.toc_trees {
        Some(path) => TocTrees::from_file(path)?,
        None => TocTrees::new(),
    };
    let assembled = NavigationAssembler::new(&declaration).assemble(&trees)?;
    info!(
        "Assembled navigation: {} node(s), {} document(s)",
        assembled.prefix_index.len(),
        assembled.documents.len()
    );
    Ok(LoadedNavigation {
        declaration,
        assembled,
    })
}

/// Run navigation, fetch and consistency phases.
pub fn execute_check(
    config: &BuildConfig,
    client: &LinkRegistryClient,
    local: Option<LocalManifest>,
    on_fetched: &(dyn Fn(&str) + Sync),
) -> Result<CheckReport> {
    // Phase 1: Navigation
    let navigation = load_navigation(config)?;

    // Phase 2: Fetch
    let mut repositories = navigation.repositories();
    repositories.extend(config.cross_links.iter().map(|r| r.to_ascii_lowercase()));
    let repositories: Vec<String> = repositories.into_iter().collect();
    let mut manifests = fetch::execute(
        client,
        &repositories,
        &config.fetch_options(FetchScope::Declared),
        on_fetched,
    )?;

    let mut namespace_violations = Vec::new();
    if let Some(local) = local {
        namespace_violations = consistency::check_namespaces(
            &local.repository,
            &local.manifest,
            &navigation.assembled.prefix_index,
        );
        manifests = manifests.with_manifest(&local.repository, local.manifest);
    }

    // Phase 3: Consistency
    let phantoms = navigation.phantoms(&config.phantoms);
    let collisions = consistency::check(
        manifests.manifests(),
        &navigation.assembled.prefix_index,
        &phantoms,
    );
    info!(
        "Checked {} manifest(s): {} collision(s)",
        manifests.len(),
        collisions.len()
    );

    Ok(CheckReport {
        navigation,
        manifests,
        collisions,
        namespace_violations,
    })
}
