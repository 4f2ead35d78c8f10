//! # Cross-link Resolution
//!
//! Resolves a symbolic `repository://path#fragment` reference against the
//! fetched manifests to a validated, environment-specific URL.
//!
//! ## Algorithm
//!
//! 1. The path is normalised: separators, extension, `index` leaf.
//! 2. A scheme without a manifest is either not published yet (declared) or
//!    not declared at all.
//! 3. Redirects are consulted before links, so a repository can forward a
//!    page without removing it from its manifest.
//! 4. Otherwise the path must be a published link, and a fragment must be
//!    one of its anchors.
//! 5. The output path is found through the [`PrefixIndex`] and handed to
//!    the [`UrlBuilder`].
//!
//! Resolution is a pure function of its inputs. Failures are typed
//! [`ResolutionError`] values; nothing here panics on data.

use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::diagnostics::Severity;
use crate::environment::UrlBuilder;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, RedirectSpec, RedirectTarget};
use crate::path::{join_host_path, normalize_separators, to_target_path};
use crate::phases::fetch::FetchedManifests;
use crate::prefix::PrefixIndex;

/// Schemes that are ordinary links rather than cross-links.
const WEB_SCHEMES: &[&str] = &["http", "https", "mailto", "file"];

/// A symbolic reference into another repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossLinkReference {
    scheme: String,
    path: String,
    fragment: Option<String>,
}

impl CrossLinkReference {
    /// # Panics
    ///
    /// Panics if `scheme` is empty.
    pub fn new(scheme: &str, path: &str, fragment: Option<&str>) -> Self {
        assert!(
            !scheme.trim().is_empty(),
            "a cross-link needs a repository scheme"
        );
        Self {
            scheme: scheme.trim().to_ascii_lowercase(),
            path: normalize_separators(path).trim_matches('/').to_string(),
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    /// Parse `repository://path#fragment`. Percent-escapes are decoded.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidCrossLink {
            link: uri.to_string(),
            message: message.to_string(),
        };

        if !uri.contains("://") {
            return Err(invalid("expected '<repository>://<path>'"));
        }
        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if WEB_SCHEMES.contains(&url.scheme()) {
            return Err(invalid("not a cross-repository link"));
        }

        let host = percent_decode_str(url.host_str().unwrap_or_default()).decode_utf8_lossy();
        let path = percent_decode_str(url.path()).decode_utf8_lossy();
        let fragment = url
            .fragment()
            .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned());

        Ok(Self::new(
            url.scheme(),
            &join_host_path(&host, &path),
            fragment.as_deref(),
        ))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

impl fmt::Display for CrossLinkReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Why a reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("'{scheme}' is not declared as a valid cross-link repository")]
    NotDeclared { scheme: String },

    #[error("'{scheme}' is declared as a cross-link repository but has not published a manifest yet")]
    NotPublishedYet { scheme: String },

    #[error("Could not fetch the '{scheme}' manifest: {message}")]
    FetchFailed { scheme: String, message: String },

    #[error("'{path}' is not a valid link in the '{scheme}' cross-link index")]
    UnknownPath { scheme: String, path: String },

    #[error(
        "'{scheme}://{path}' is an ambiguous redirect: {matched} of [{}] matched",
        candidates.join(", ")
    )]
    AmbiguousRedirect {
        scheme: String,
        path: String,
        candidates: Vec<String>,
        matched: usize,
    },

    #[error(
        "'{scheme}://{path}' has no anchor named '#{anchor}'{}",
        redirect_from.as_ref().map(|r| format!(" (redirected from '{}')", r)).unwrap_or_default()
    )]
    UnknownAnchor {
        scheme: String,
        path: String,
        anchor: String,
        redirect_from: Option<String>,
    },
}

impl ResolutionError {
    /// Severity of this failure. Strict mode makes every failure an error.
    pub fn severity(&self, strict: bool) -> Severity {
        match self {
            ResolutionError::NotPublishedYet { .. } if !strict => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// The repository the failed reference pointed into.
    pub fn scheme(&self) -> &str {
        match self {
            ResolutionError::NotDeclared { scheme }
            | ResolutionError::NotPublishedYet { scheme }
            | ResolutionError::FetchFailed { scheme, .. }
            | ResolutionError::UnknownPath { scheme, .. }
            | ResolutionError::AmbiguousRedirect { scheme, .. }
            | ResolutionError::UnknownAnchor { scheme, .. } => scheme,
        }
    }
}

/// A successfully resolved reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The final target after redirects and anchor rewriting.
    pub target: CrossLinkReference,
    /// Published path, without the fragment.
    pub output_path: String,
    pub url: String,
}

type Resolution<T> = std::result::Result<T, ResolutionError>;

/// Resolves references against one fetched manifest set.
pub struct CrossLinkResolver<'a> {
    manifests: &'a FetchedManifests,
    prefix_index: Option<&'a PrefixIndex>,
    url_builder: &'a dyn UrlBuilder,
}

impl<'a> CrossLinkResolver<'a> {
    /// Without a prefix index, output paths are the repository paths.
    pub fn new(
        manifests: &'a FetchedManifests,
        prefix_index: Option<&'a PrefixIndex>,
        url_builder: &'a dyn UrlBuilder,
    ) -> Self {
        Self {
            manifests,
            prefix_index,
            url_builder,
        }
    }

    pub fn resolve(&self, reference: &CrossLinkReference) -> Resolution<ResolvedLink> {
        let scheme = reference.scheme();
        let manifest = self.manifest_for(scheme)?;
        let lookup = to_target_path(reference.path());

        let (path, fragment) = match manifest.redirect(&lookup) {
            Some(spec) => self.follow_redirect(manifest, scheme, &lookup, spec, reference.fragment())?,
            None => {
                let (published, metadata) =
                    manifest
                        .link(&lookup)
                        .ok_or_else(|| ResolutionError::UnknownPath {
                            scheme: scheme.to_string(),
                            path: lookup.clone(),
                        })?;
                // the spelling the repository published, not the caller's
                let path = to_target_path(published);
                if let Some(anchor) = reference.fragment() {
                    if !metadata.has_anchor(anchor) {
                        return Err(ResolutionError::UnknownAnchor {
                            scheme: scheme.to_string(),
                            path,
                            anchor: anchor.to_string(),
                            redirect_from: None,
                        });
                    }
                }
                (path, reference.fragment().map(str::to_string))
            }
        };

        let output_path = self
            .prefix_index
            .and_then(|index| index.resolve(scheme, &path))
            .map(|matched| matched.output_path())
            .unwrap_or_else(|| path.clone());

        let target = CrossLinkReference::new(scheme, &path, fragment.as_deref());
        let with_fragment = match target.fragment() {
            Some(fragment) => format!("{}#{}", output_path, fragment),
            None => output_path.clone(),
        };
        let url = self.url_builder.build(&target, &with_fragment);

        Ok(ResolvedLink {
            target,
            output_path,
            url,
        })
    }

    fn manifest_for(&self, scheme: &str) -> Resolution<&'a Manifest> {
        if let Some(manifest) = self.manifests.manifest(scheme) {
            return Ok(manifest);
        }
        if let Some(message) = self.manifests.failure(scheme) {
            return Err(ResolutionError::FetchFailed {
                scheme: scheme.to_string(),
                message: message.to_string(),
            });
        }
        if self.manifests.is_declared(scheme) {
            Err(ResolutionError::NotPublishedYet {
                scheme: scheme.to_string(),
            })
        } else {
            Err(ResolutionError::NotDeclared {
                scheme: scheme.to_string(),
            })
        }
    }

    fn follow_redirect(
        &self,
        manifest: &Manifest,
        scheme: &str,
        lookup: &str,
        spec: &RedirectSpec,
        fragment: Option<&str>,
    ) -> Resolution<(String, Option<String>)> {
        match spec {
            RedirectSpec::Single(target) => {
                self.follow_single(manifest, scheme, lookup, target, fragment)
            }
            RedirectSpec::FanOut(candidates) => {
                self.follow_fan_out(manifest, scheme, lookup, candidates, fragment)
            }
        }
    }

    fn follow_single(
        &self,
        manifest: &Manifest,
        scheme: &str,
        lookup: &str,
        target: &RedirectTarget,
        fragment: Option<&str>,
    ) -> Resolution<(String, Option<String>)> {
        let path = redirect_destination(lookup, target);
        let Some(anchor) = fragment else {
            return Ok((path, None));
        };

        match &target.anchors {
            Some(rewrite) => match rewrite.rewrite(anchor) {
                Some(rewritten) => Ok((path, rewritten)),
                None => Err(ResolutionError::UnknownAnchor {
                    scheme: scheme.to_string(),
                    path,
                    anchor: anchor.to_string(),
                    redirect_from: Some(lookup.to_string()),
                }),
            },
            None => match manifest.link(&path) {
                Some((_, metadata)) if !metadata.has_anchor(anchor) => {
                    Err(ResolutionError::UnknownAnchor {
                        scheme: scheme.to_string(),
                        path,
                        anchor: anchor.to_string(),
                        redirect_from: Some(lookup.to_string()),
                    })
                }
                _ => Ok((path, Some(anchor.to_string()))),
            },
        }
    }

    fn follow_fan_out(
        &self,
        manifest: &Manifest,
        scheme: &str,
        lookup: &str,
        candidates: &[RedirectTarget],
        fragment: Option<&str>,
    ) -> Resolution<(String, Option<String>)> {
        let published: Vec<(String, &RedirectTarget)> = candidates
            .iter()
            .map(|c| (redirect_destination(lookup, c), c))
            .filter(|(path, _)| manifest.contains_link(path))
            .collect();

        let ambiguous = |matched: usize| ResolutionError::AmbiguousRedirect {
            scheme: scheme.to_string(),
            path: lookup.to_string(),
            candidates: candidates
                .iter()
                .map(|c| redirect_destination(lookup, c))
                .collect(),
            matched,
        };

        match fragment {
            Some(anchor) => published
                .into_iter()
                .find_map(|(path, candidate)| {
                    let rewritten = candidate.anchors.as_ref()?.rewrite(anchor)?;
                    Some((path, rewritten))
                })
                .ok_or_else(|| ambiguous(0)),
            None if published.len() == 1 => {
                let (path, _) = published.into_iter().next().ok_or_else(|| ambiguous(0))?;
                Ok((path, None))
            }
            None => Err(ambiguous(published.len())),
        }
    }
}

fn redirect_destination(lookup: &str, target: &RedirectTarget) -> String {
    if target.to.is_empty() {
        lookup.to_string()
    } else {
        to_target_path(&target.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::RelativeUrlBuilder;
    use crate::prefix::{PrefixIndexBuilder, SourceUri};

    const REPO: &str = r#"{
        "links": {
            "guide/intro.md": { "anchors": ["setup"] },
            "guide/index.md": {},
            "new/a.md": { "anchors": ["y"] },
            "new/b.md": { "anchors": ["z"] },
            "moved/target.md": { "anchors": ["kept"] }
        },
        "redirects": {
            "old/path.md": { "many": [ { "to": "new/a.md", "anchors": { "x": "y" } }, { "to": "new/b.md" } ] },
            "old/single.md": { "to": "moved/target.md" },
            "old/dropped.md": { "to": "moved/target.md", "anchors": { "!": "!" } },
            "old/mapped.md": { "to": "moved/target.md", "anchors": { "before": "kept" } },
            "old/half.md": { "many": [ { "to": "new/a.md" }, { "to": "new/gone.md" } ] },
            "old/lone.md": { "many": [ { "to": "new/gone.md" } ] },
            "old/lone-kept.md": { "many": [ { "to": "new/b.md" } ] },
            "guide/index.md": { "to": "" }
        }
    }"#;

    fn manifests() -> FetchedManifests {
        FetchedManifests::new(["repo", "pending"])
            .with_manifest("repo", Manifest::from_json("repo", REPO).unwrap())
    }

    fn resolve(uri: &str) -> Resolution<ResolvedLink> {
        let manifests = manifests();
        let resolver = CrossLinkResolver::new(&manifests, None, &RelativeUrlBuilder);
        resolver.resolve(&CrossLinkReference::parse(uri).unwrap())
    }

    #[test]
    fn test_parse_reference() {
        let reference = CrossLinkReference::parse("Kibana://guide/intro.md#setup").unwrap();
        assert_eq!(reference.scheme(), "kibana");
        assert_eq!(reference.path(), "guide/intro.md");
        assert_eq!(reference.fragment(), Some("setup"));
        assert_eq!(reference.to_string(), "kibana://guide/intro.md#setup");
    }

    #[test]
    fn test_parse_bare_file_reference() {
        let reference = CrossLinkReference::parse("kibana://index.md").unwrap();
        assert_eq!(reference.path(), "index.md");
        assert_eq!(reference.fragment(), None);
    }

    #[test]
    fn test_parse_decodes_percent_escapes() {
        let reference = CrossLinkReference::parse("kibana://guide/my%20page.md#a%20b").unwrap();
        assert_eq!(reference.path(), "guide/my page.md");
        assert_eq!(reference.fragment(), Some("a b"));
    }

    #[test]
    fn test_parse_rejects_web_links() {
        assert!(CrossLinkReference::parse("https://example.com/a").is_err());
        assert!(CrossLinkReference::parse("guide/intro.md").is_err());
    }

    #[test]
    #[should_panic(expected = "repository scheme")]
    fn test_reference_requires_scheme() {
        CrossLinkReference::new(" ", "guide", None);
    }

    #[test]
    fn test_direct_link_with_anchor() {
        let resolved = resolve("repo://guide/intro.md#setup").unwrap();
        assert_eq!(resolved.target.fragment(), Some("setup"));
        assert_eq!(resolved.output_path, "guide/intro");
        assert_eq!(resolved.url, "/guide/intro#setup");
    }

    #[test]
    fn test_direct_link_missing_anchor() {
        let err = resolve("repo://guide/intro#missing").unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownAnchor { redirect_from: None, .. }));
    }

    #[test]
    fn test_unknown_path() {
        let err = resolve("repo://guide/missing.md").unwrap_err();
        assert_eq!(
            err,
            ResolutionError::UnknownPath {
                scheme: "repo".to_string(),
                path: "guide/missing".to_string(),
            }
        );
        assert!(err.to_string().contains("not a valid link in the 'repo'"));
    }

    #[test]
    fn test_case_and_separator_insensitive() {
        let resolved = resolve("repo://Guide/INTRO.MD").unwrap();
        assert_eq!(resolved.output_path, "guide/intro");
    }

    #[test]
    fn test_index_self_redirect_collapses_to_folder() {
        let resolved = resolve("repo://guide/index.md").unwrap();
        assert_eq!(resolved.output_path, "guide");
    }

    #[test]
    fn test_not_published_yet_is_warning() {
        let err = resolve("pending://guide/intro.md").unwrap_err();
        assert_eq!(err.severity(false), Severity::Warning);
        assert_eq!(err.severity(true), Severity::Error);
    }

    #[test]
    fn test_not_declared_is_error() {
        let err = resolve("unknown://guide/intro.md").unwrap_err();
        assert!(matches!(err, ResolutionError::NotDeclared { .. }));
        assert_eq!(err.severity(false), Severity::Error);
    }

    #[test]
    fn test_fetch_failure_is_reported() {
        let manifests = manifests().with_failure("broken", "HTTP 500");
        let resolver = CrossLinkResolver::new(&manifests, None, &RelativeUrlBuilder);
        let err = resolver
            .resolve(&CrossLinkReference::new("broken", "a", None))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::FetchFailed { .. }));
    }

    #[test]
    fn test_fan_out_disambiguated_by_fragment() {
        let resolved = resolve("repo://old/path#x").unwrap();
        assert_eq!(resolved.target.path(), "new/a");
        assert_eq!(resolved.target.fragment(), Some("y"));
    }

    #[test]
    fn test_fan_out_without_fragment_is_ambiguous() {
        match resolve("repo://old/path").unwrap_err() {
            ResolutionError::AmbiguousRedirect {
                candidates, matched, ..
            } => {
                assert_eq!(candidates, vec!["new/a", "new/b"]);
                assert_eq!(matched, 2);
            }
            other => panic!("expected AmbiguousRedirect, got {:?}", other),
        }
    }

    #[test]
    fn test_fan_out_unhandled_fragment() {
        let err = resolve("repo://old/path#z").unwrap_err();
        assert!(matches!(err, ResolutionError::AmbiguousRedirect { matched: 0, .. }));
    }

    #[test]
    fn test_fan_out_with_single_published_candidate() {
        let resolved = resolve("repo://old/half").unwrap();
        assert_eq!(resolved.target.path(), "new/a");
    }

    #[test]
    fn test_fan_out_of_one_requires_published_target() {
        match resolve("repo://old/lone").unwrap_err() {
            ResolutionError::AmbiguousRedirect {
                candidates, matched, ..
            } => {
                assert_eq!(candidates, vec!["new/gone"]);
                assert_eq!(matched, 0);
            }
            other => panic!("expected AmbiguousRedirect, got {:?}", other),
        }
        assert_eq!(resolve("repo://old/lone-kept").unwrap().target.path(), "new/b");
    }

    #[test]
    fn test_fan_out_candidate_without_anchor_map_never_matches_fragment() {
        let err = resolve("repo://old/half#y").unwrap_err();
        assert!(matches!(err, ResolutionError::AmbiguousRedirect { .. }));
    }

    #[test]
    fn test_single_redirect_carries_fragment() {
        let resolved = resolve("repo://old/single#kept").unwrap();
        assert_eq!(resolved.target.path(), "moved/target");
        assert_eq!(resolved.target.fragment(), Some("kept"));

        let err = resolve("repo://old/single#nope").unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::UnknownAnchor { redirect_from: Some(_), .. }
        ));
    }

    #[test]
    fn test_drop_all_redirect_drops_fragment() {
        let resolved = resolve("repo://old/dropped#anything").unwrap();
        assert_eq!(resolved.target.fragment(), None);
        assert_eq!(resolved.url, "/moved/target");
    }

    #[test]
    fn test_anchor_map_redirect() {
        let resolved = resolve("repo://old/mapped#before").unwrap();
        assert_eq!(resolved.target.fragment(), Some("kept"));

        let err = resolve("repo://old/mapped#other").unwrap_err();
        assert!(err.to_string().contains("redirected from 'old/mapped'"));
    }

    #[test]
    fn test_redirect_matches_direct_target() {
        let redirected = resolve("repo://old/single").unwrap();
        let direct = resolve("repo://moved/target.md").unwrap();
        assert_eq!(redirected.output_path, direct.output_path);
    }

    #[test]
    fn test_output_path_uses_prefix_index() {
        let mut builder = PrefixIndexBuilder::new();
        builder
            .register(SourceUri::new("repo", "guide"), "reference/repo")
            .unwrap();
        let index = builder.build();
        let manifests = manifests();
        let resolver = CrossLinkResolver::new(&manifests, Some(&index), &RelativeUrlBuilder);

        let resolved = resolver
            .resolve(&CrossLinkReference::parse("repo://guide/intro.md#setup").unwrap())
            .unwrap();
        assert_eq!(resolved.output_path, "reference/repo/intro");
        assert_eq!(resolved.url, "/reference/repo/intro#setup");

        // not claimed by the navigation
        let resolved = resolver
            .resolve(&CrossLinkReference::parse("repo://new/a.md").unwrap())
            .unwrap();
        assert_eq!(resolved.output_path, "new/a");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for uri in ["repo://old/path#x", "repo://old/path", "repo://guide/intro#nope"] {
            assert_eq!(resolve(uri), resolve(uri));
        }
    }
}
