//! Build phases.
//!
//! A check runs three phases, each depending only on the previous ones:
//! 1. Navigation - parse the declaration and build the prefix index
//! 2. Fetch - load manifests in parallel (with automatic caching)
//! 3. Consistency - detect cross-repository path collisions
//!
//! The fetch phase is also used on its own by resolution and audits.

pub mod fetch;
pub mod orchestrator;

pub use fetch::{FetchOptions, FetchScope, FetchedManifests};
pub use orchestrator::{execute_check, load_navigation, CheckReport, LoadedNavigation, LocalManifest};
