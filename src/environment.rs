//! Environment-specific URL builders.
//!
//! The resolver never decides what a link looks like in the rendered site.
//! It hands the resolved target and its output path to a [`UrlBuilder`]
//! selected by the `environment` section of the build configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::resolver::CrossLinkReference;

/// Preview site used when the configuration does not name one.
pub const PREVIEW_URL: &str = "https://docs-preview.example.com";

/// Organisation repositories are previewed under.
pub const PREVIEW_ORGANIZATION: &str = "elastic";

/// Builds the final URL of a resolved cross-link.
pub trait UrlBuilder: Send + Sync {
    /// `output_path` is the published path, with `#fragment` already
    /// appended when the link carries one.
    fn build(&self, target: &CrossLinkReference, output_path: &str) -> String;
}

/// Per-repository preview builds: `{base}/{org}/{repo}/tree/{branch}/{path}`.
#[derive(Debug, Clone)]
pub struct PreviewUrlBuilder {
    base: Url,
    organization: String,
    branch: String,
}

impl PreviewUrlBuilder {
    pub fn new(base: &str, organization: &str, branch: &str) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base)?,
            organization: organization.to_string(),
            branch: branch.to_string(),
        })
    }
}

impl UrlBuilder for PreviewUrlBuilder {
    fn build(&self, target: &CrossLinkReference, output_path: &str) -> String {
        format!(
            "{}/{}/{}/tree/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            self.organization,
            target.scheme(),
            self.branch,
            output_path.trim_start_matches('/')
        )
    }
}

/// The assembled site: `{base}/{path_prefix}/{path}`.
#[derive(Debug, Clone)]
pub struct PublishUrlBuilder {
    base: Url,
    path_prefix: Option<String>,
}

impl PublishUrlBuilder {
    pub fn new(base: &str, path_prefix: Option<&str>) -> Result<Self> {
        Ok(Self {
            base: Url::parse(base)?,
            path_prefix: path_prefix
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        })
    }
}

impl UrlBuilder for PublishUrlBuilder {
    fn build(&self, _target: &CrossLinkReference, output_path: &str) -> String {
        let base = self.base.as_str().trim_end_matches('/');
        let path = output_path.trim_start_matches('/');
        match &self.path_prefix {
            Some(prefix) => format!("{}/{}/{}", base, prefix, path),
            None => format!("{}/{}", base, path),
        }
    }
}

/// Root-relative links: `/{path}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeUrlBuilder;

impl UrlBuilder for RelativeUrlBuilder {
    fn build(&self, _target: &CrossLinkReference, output_path: &str) -> String {
        format!("/{}", output_path.trim_start_matches('/'))
    }
}

fn default_preview_url() -> String {
    PREVIEW_URL.to_string()
}

fn default_organization() -> String {
    PREVIEW_ORGANIZATION.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

/// The `environment` section of `docmesh.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum EnvironmentConfig {
    Preview {
        #[serde(default = "default_preview_url")]
        uri: String,
        #[serde(default = "default_organization")]
        organization: String,
        #[serde(default = "default_branch")]
        branch: String,
    },
    Publish {
        uri: String,
        #[serde(default)]
        path_prefix: Option<String>,
    },
    #[default]
    Relative,
}

impl EnvironmentConfig {
    pub fn url_builder(&self) -> Result<Box<dyn UrlBuilder>> {
        Ok(match self {
            EnvironmentConfig::Preview {
                uri,
                organization,
                branch,
            } => Box::new(PreviewUrlBuilder::new(uri, organization, branch)?),
            EnvironmentConfig::Publish { uri, path_prefix } => {
                Box::new(PublishUrlBuilder::new(uri, path_prefix.as_deref())?)
            }
            EnvironmentConfig::Relative => Box::new(RelativeUrlBuilder),
        })
    }
}
