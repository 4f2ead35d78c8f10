//! # docmesh
//!
//! Cross-repository link resolution and global navigation assembly for a
//! documentation site built from many independently published repositories.
//!
//! Every repository publishes a links manifest: the documents it exposes,
//! their anchors, its redirects and the cross-links it makes. A central
//! registry records where the latest manifest for each repository lives.
//! This crate fetches those manifests, resolves symbolic
//! `repository://path#anchor` references into validated URLs, maps every
//! repository's documents into one global hierarchy described by a
//! navigation file, and detects paths claimed by more than one repository.
//!
//! ## Quick Example
//!
//! ```
//! use docmesh::environment::RelativeUrlBuilder;
//! use docmesh::manifest::Manifest;
//! use docmesh::phases::FetchedManifests;
//! use docmesh::resolver::{CrossLinkReference, CrossLinkResolver};
//!
//! let manifest = Manifest::from_json(
//!     "kibana",
//!     r#"{ "links": { "guide/intro.md": { "anchors": ["setup"] } } }"#,
//! )
//! .unwrap();
//! let manifests = FetchedManifests::new(["kibana"]).with_manifest("kibana", manifest);
//!
//! let resolver = CrossLinkResolver::new(&manifests, None, &RelativeUrlBuilder);
//! let reference = CrossLinkReference::parse("kibana://guide/intro.md#setup").unwrap();
//! let resolved = resolver.resolve(&reference).unwrap();
//! assert_eq!(resolved.url, "/guide/intro#setup");
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifests (`manifest`, `registry`)**: the per-repository links
//!   manifest and the registry index that locates it.
//! - **Fetching (`client`, `cache`)**: a registry client with retries,
//!   cancellation and a content-addressed manifest cache.
//! - **Resolution (`resolver`)**: redirects, anchors and output paths for a
//!   single cross-link, failing with typed [`resolver::ResolutionError`]s.
//! - **Navigation (`navigation`, `prefix`)**: the declaration that binds
//!   repository folders to global path prefixes, and the longest-prefix
//!   index built from it.
//! - **Consistency (`consistency`, `audit`)**: collision detection across
//!   repositories and auditing of published cross-links.
//!
//! ## Execution Flow
//!
//! [`phases::execute_check`] runs a complete check:
//!
//! 1.  **Navigation**: parse the declaration and build the prefix index.
//! 2.  **Fetch**: load every relevant manifest in parallel (with caching).
//! 3.  **Consistency**: replay every manifest through the prefix index.

pub mod audit;
pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod consistency;
pub mod defaults;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod manifest;
pub mod navigation;
pub mod output;
pub mod path;
pub mod phases;
pub mod prefix;
pub mod registry;
pub mod resolver;
pub mod suggestions;

#[cfg(test)]
mod path_proptest;
