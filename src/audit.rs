//! Inbound cross-link audit.
//!
//! Replays the cross-links every repository has published through the
//! resolver, so a repository can learn which links into it would break
//! before it publishes a change. Used by `docmesh links validate` and, with
//! one repository's manifest replaced by a local build, by
//! `docmesh links validate-local`.

use log::info;

use crate::diagnostics::DiagnosticsCollector;
use crate::environment::UrlBuilder;
use crate::phases::fetch::FetchedManifests;
use crate::prefix::PrefixIndex;
use crate::resolver::{CrossLinkReference, CrossLinkResolver, ResolutionError};

/// Restricts which links are audited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Only links pointing into this repository.
    pub links_to: Option<String>,
    /// Only links made by this repository.
    pub links_from: Option<String>,
}

impl AuditFilter {
    fn includes_source(&self, repository: &str) -> bool {
        self.links_from
            .as_deref()
            .map_or(true, |from| from.eq_ignore_ascii_case(repository))
    }

    fn includes_target(&self, scheme: &str) -> bool {
        self.links_to
            .as_deref()
            .map_or(true, |to| to.eq_ignore_ascii_case(scheme))
    }

    /// Target filter for a link that does not parse, by its text up to `://`.
    fn includes_raw_target(&self, link: &str) -> bool {
        match link.split_once("://") {
            Some((scheme, _)) => self.includes_target(scheme.trim()),
            None => self.links_to.is_none(),
        }
    }
}

/// Counts from one audit run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub repositories: usize,
    pub checked: usize,
    pub broken: usize,
}

pub struct LinkAuditor<'a> {
    manifests: &'a FetchedManifests,
    resolver: CrossLinkResolver<'a>,
}

impl<'a> LinkAuditor<'a> {
    pub fn new(
        manifests: &'a FetchedManifests,
        prefix_index: Option<&'a PrefixIndex>,
        url_builder: &'a dyn UrlBuilder,
    ) -> Self {
        Self {
            manifests,
            resolver: CrossLinkResolver::new(manifests, prefix_index, url_builder),
        }
    }

    /// Audit every matching published cross-link into `collector`.
    ///
    /// Repositories that could not be fetched are reported as warnings,
    /// or as errors when the collector is strict.
    pub fn audit(&self, filter: &AuditFilter, collector: &DiagnosticsCollector) -> AuditSummary {
        let mut summary = AuditSummary::default();

        for (repository, message) in self.manifests.failures() {
            if !filter.includes_source(repository) && !filter.includes_target(repository) {
                continue;
            }
            if collector.is_strict() {
                collector.emit_error(repository, message.as_str());
            } else {
                collector.emit_warning(repository, message.as_str());
            }
        }

        for (from, manifest) in self.manifests.manifests() {
            if !filter.includes_source(from) {
                continue;
            }
            summary.repositories += 1;

            for link in manifest.cross_links() {
                let reference = match CrossLinkReference::parse(link) {
                    Ok(reference) => reference,
                    Err(e) => {
                        if !filter.includes_raw_target(link) {
                            continue;
                        }
                        summary.checked += 1;
                        summary.broken += 1;
                        collector.emit_error(from, e.to_string());
                        continue;
                    }
                };
                if !filter.includes_target(reference.scheme()) {
                    continue;
                }

                summary.checked += 1;
                if let Err(failure) = self.resolver.resolve(&reference) {
                    summary.broken += 1;
                    self.report(from, &reference, &failure, collector);
                }
            }
        }

        info!(
            "Audited {} cross-link(s) from {} repositories, {} broken",
            summary.checked, summary.repositories, summary.broken
        );
        summary
    }

    fn report(
        &self,
        from: &str,
        reference: &CrossLinkReference,
        failure: &ResolutionError,
        collector: &DiagnosticsCollector,
    ) {
        match failure {
            ResolutionError::UnknownPath { scheme, .. } => collector.emit_error(
                from,
                format!(
                    "'{}' links to unknown file: '{}' in the '{}' cross-link index",
                    from, reference, scheme
                ),
            ),
            // already reported once per repository above
            ResolutionError::FetchFailed { .. } => {}
            _ => collector.emit_resolution(from, None, failure),
        }
    }
}
