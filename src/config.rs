//! # Build Configuration
//!
//! This module defines `docmesh.yaml`, the configuration of a build:
//!
//! ```yaml
//! registry:
//!   url: https://links.example.com/link-index.json
//!   manifest_base_url: https://links.example.com/
//! cross_links: [elasticsearch, kibana, apm-server]
//! branches: [main, master]
//! strict: false
//! narrative: docs-content
//! navigation: navigation.yml
//! toc_trees: toc-trees.json
//! fetch:
//!   timeout_secs: 5
//!   retries: 2
//!   concurrency: 0
//! navigation_max_depth: 16
//! phantoms: ["reference/shared"]
//! legacy_exports: ["eland://sphinx/*"]
//! environment:
//!   kind: publish
//!   uri: https://docs.example.com
//!   path_prefix: docs
//! ```
//!
//! Every field is optional. Relative `navigation` and `toc_trees` paths are
//! resolved against the directory of the configuration file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::FetchSettings;
use crate::defaults;
use crate::environment::EnvironmentConfig;
use crate::error::{Error, Result};
use crate::navigation::NavigationOptions;
use crate::phases::fetch::{FetchOptions, FetchScope};
use crate::prefix::OutputRules;

/// Top-level keys, for unknown-field hints.
const FIELDS: &[&str] = &[
    "registry",
    "cross_links",
    "branches",
    "strict",
    "narrative",
    "navigation",
    "toc_trees",
    "fetch",
    "navigation_max_depth",
    "phantoms",
    "legacy_exports",
    "environment",
];

fn repository_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9][a-z0-9._-]*$").expect("repository name pattern is valid")
    })
}

/// Whether `name` is a valid repository name (and cross-link scheme).
pub fn is_valid_repository_name(name: &str) -> bool {
    repository_name_pattern().is_match(name)
}

fn default_registry_url() -> String {
    defaults::REGISTRY_URL.to_string()
}

fn default_branches() -> Vec<String> {
    defaults::BRANCHES.iter().map(|b| b.to_string()).collect()
}

fn default_narrative() -> String {
    defaults::NARRATIVE_REPOSITORY.to_string()
}

fn default_timeout_secs() -> u64 {
    defaults::FETCH_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    defaults::FETCH_RETRIES
}

fn default_max_depth() -> usize {
    defaults::NAVIGATION_MAX_DEPTH
}

/// Where the registry index and manifests live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// Base relative manifest locations are joined onto.
    #[serde(default)]
    pub manifest_base_url: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            manifest_base_url: None,
        }
    }
}

/// Network settings for the fetch phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// 0 uses one worker per available core.
    #[serde(default)]
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            concurrency: 0,
        }
    }
}

/// The parsed `docmesh.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Repositories cross-links may point into.
    #[serde(default)]
    pub cross_links: Vec<String>,
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
    /// Treat warnings as build failures.
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_narrative")]
    pub narrative: String,
    #[serde(default)]
    pub navigation: Option<PathBuf>,
    #[serde(default)]
    pub toc_trees: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_max_depth")]
    pub navigation_max_depth: usize,
    #[serde(default)]
    pub phantoms: Vec<String>,
    #[serde(default)]
    pub legacy_exports: Vec<String>,
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            cross_links: Vec::new(),
            branches: default_branches(),
            strict: false,
            narrative: default_narrative(),
            navigation: None,
            toc_trees: None,
            fetch: FetchConfig::default(),
            navigation_max_depth: default_max_depth(),
            phantoms: Vec::new(),
            legacy_exports: Vec::new(),
            environment: EnvironmentConfig::default(),
        }
    }
}

fn config_error(message: impl Into<String>, hint: Option<&str>) -> Error {
    Error::ConfigParse {
        message: message.into(),
        hint: hint.map(str::to_string),
    }
}

/// Parses a YAML string into a `BuildConfig` and validates it.
pub fn parse(yaml_content: &str) -> Result<BuildConfig> {
    // an empty file is an all-defaults configuration
    if yaml_content.trim().is_empty() {
        return Ok(BuildConfig::default());
    }

    let config: BuildConfig = serde_yaml::from_str(yaml_content).map_err(|e| {
        let message = e.to_string();
        let hint = message
            .contains("unknown field")
            .then(|| format!("valid keys are: {}", FIELDS.join(", ")));
        config_error(message, hint.as_deref())
    })?;
    config.validate()?;
    Ok(config)
}

/// Parse a `BuildConfig` from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<BuildConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut config = parse(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.navigation = config.navigation.map(|p| base.join(p));
    config.toc_trees = config.toc_trees.map(|p| base.join(p));
    Ok(config)
}

impl BuildConfig {
    fn validate(&self) -> Result<()> {
        Url::parse(&self.registry.url).map_err(|e| {
            config_error(
                format!("registry.url '{}' is not a valid URL: {}", self.registry.url, e),
                None,
            )
        })?;
        if let Some(base) = &self.registry.manifest_base_url {
            Url::parse(base).map_err(|e| {
                config_error(
                    format!("registry.manifest_base_url '{}' is not a valid URL: {}", base, e),
                    None,
                )
            })?;
        }

        for name in self.cross_links.iter().chain(std::iter::once(&self.narrative)) {
            if !is_valid_repository_name(name) {
                return Err(config_error(
                    format!("'{}' is not a valid repository name", name),
                    Some("repository names start with a letter or digit and contain only letters, digits, '.', '_' and '-'"),
                ));
            }
        }

        if self.branches.is_empty() {
            return Err(config_error(
                "branches must not be empty",
                Some("use `branches: [main, master]`"),
            ));
        }

        if self.navigation_max_depth == 0 {
            return Err(config_error("navigation_max_depth must be at least 1", None));
        }

        for pattern in &self.legacy_exports {
            glob::Pattern::new(pattern).map_err(|e| {
                config_error(
                    format!("legacy_exports pattern '{}' is invalid: {}", pattern, e),
                    Some("use * for one path component, e.g. 'eland://sphinx/*'"),
                )
            })?;
        }

        self.environment.url_builder()?;
        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            retries: self.fetch.retries,
            ..FetchSettings::default()
        }
    }

    pub fn fetch_options(&self, scope: FetchScope) -> FetchOptions {
        FetchOptions {
            branches: self.branches.clone(),
            concurrency: self.fetch.concurrency,
            scope,
        }
    }

    pub fn navigation_options(&self) -> NavigationOptions {
        NavigationOptions {
            narrative: self.narrative.clone(),
            max_depth: self.navigation_max_depth,
        }
    }

    pub fn output_rules(&self) -> Result<OutputRules> {
        OutputRules::new(&self.narrative, &self.legacy_exports)
    }

    /// The navigation declaration path, or an error naming the missing key.
    pub fn navigation_path(&self) -> Result<&Path> {
        self.navigation.as_deref().ok_or_else(|| {
            config_error(
                "no navigation declaration is configured",
                Some("add `navigation: navigation.yml` to docmesh.yaml"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
registry:
  url: https://links.test/link-index.json
  manifest_base_url: https://links.test/
cross_links: [elasticsearch, kibana]
branches: [main]
strict: true
navigation: navigation.yml
fetch:
  timeout_secs: 10
  retries: 0
  concurrency: 2
phantoms: ["reference/shared"]
legacy_exports: ["eland://sphinx/*"]
environment:
  kind: relative
"#;
        let config = parse(yaml).unwrap();
        assert_eq!(config.cross_links, vec!["elasticsearch", "kibana"]);
        assert_eq!(config.branches, vec!["main"]);
        assert!(config.strict);
        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(10));
        assert_eq!(config.fetch_settings().retries, 0);
        assert_eq!(config.narrative, "docs-content");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config, BuildConfig::default());
        assert_eq!(config.branches, vec!["main", "master"]);
        assert_eq!(config.registry.url, defaults::REGISTRY_URL);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.navigation_max_depth, 16);
        assert_eq!(config.environment, EnvironmentConfig::Relative);
    }

    #[test]
    fn test_unknown_field_has_hint() {
        let err = parse("cross_link: [kibana]\n").unwrap_err();
        match err {
            Error::ConfigParse { hint, .. } => {
                assert!(hint.unwrap().contains("cross_links"));
            }
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_repository_name() {
        let err = parse("cross_links: ['-bad']\n").unwrap_err();
        assert!(err.to_string().contains("not a valid repository name"));
        assert!(err.to_string().contains("hint:"));
    }

    #[test]
    fn test_repository_names() {
        assert!(is_valid_repository_name("apm-server"));
        assert!(is_valid_repository_name("Docs.Content_2"));
        assert!(!is_valid_repository_name(""));
        assert!(!is_valid_repository_name("_private"));
        assert!(!is_valid_repository_name("has space"));
    }

    #[test]
    fn test_empty_branches_rejected() {
        assert!(parse("branches: []\n").is_err());
    }

    #[test]
    fn test_invalid_registry_url() {
        assert!(parse("registry:\n  url: not-a-url\n").is_err());
    }

    #[test]
    fn test_invalid_legacy_export_glob() {
        assert!(parse("legacy_exports: ['a/[']\n").is_err());
    }

    #[test]
    fn test_navigation_path_required() {
        let config = BuildConfig::default();
        assert!(config.navigation_path().is_err());
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docmesh.yaml");
        std::fs::write(&path, "navigation: nav/navigation.yml\ntoc_trees: trees.json\n").unwrap();

        let config = from_file(&path).unwrap();
        assert_eq!(
            config.navigation_path().unwrap(),
            dir.path().join("nav/navigation.yml")
        );
        assert_eq!(config.toc_trees.unwrap(), dir.path().join("trees.json"));
    }
}
