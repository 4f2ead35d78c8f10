//! Library-level scenarios covering resolution, navigation assembly and
//! cross-repository consistency, with manifests fetched through the
//! registry client.

mod common;

use common::{registry_json, InMemoryTransport};
use docmesh::cache::ManifestCache;
use docmesh::consistency::{self, PhantomSet};
use docmesh::environment::{PublishUrlBuilder, RelativeUrlBuilder};
use docmesh::error::Error;
use docmesh::navigation::{NavigationAssembler, NavigationDeclaration, NavigationOptions};
use docmesh::phases::{fetch, FetchOptions};
use docmesh::prefix::{PrefixIndexBuilder, SourceUri};
use docmesh::resolver::{CrossLinkReference, CrossLinkResolver, ResolutionError};

const REGISTRY_URL: &str = "https://links.test/link-index.json";

const GUIDE_MANIFEST: &str = r#"{
    "origin": { "branch": "main", "remote": "elastic/guide", "ref": "abc" },
    "url_path_prefix": "/docs",
    "links": {
        "guide/intro.md": { "anchors": ["setup"] },
        "new/a.md": { "anchors": ["y"] },
        "new/b.md": {}
    },
    "redirects": {
        "old/path.md": {
            "many": [
                { "to": "new/a.md", "anchors": { "x": "y" } },
                { "to": "new/b.md" }
            ]
        }
    }
}"#;

fn fetched(transport: &InMemoryTransport, declared: &[&str]) -> docmesh::phases::FetchedManifests {
    let client = transport.client(REGISTRY_URL, ManifestCache::new());
    let declared: Vec<String> = declared.iter().map(|s| s.to_string()).collect();
    fetch::execute(&client, &declared, &FetchOptions::default(), &|_| {}).unwrap()
}

fn guide_transport() -> InMemoryTransport {
    InMemoryTransport::new()
        .serve(REGISTRY_URL, &registry_json(&[("repo", "main", "v1")]))
        .serve("https://links.test/repo/main/links.json", GUIDE_MANIFEST)
}

fn resolve(
    manifests: &docmesh::phases::FetchedManifests,
    uri: &str,
) -> Result<docmesh::resolver::ResolvedLink, ResolutionError> {
    let resolver = CrossLinkResolver::new(manifests, None, &RelativeUrlBuilder);
    resolver.resolve(&CrossLinkReference::parse(uri).unwrap())
}

#[test]
fn test_scenario_a_anchor_preserved() {
    let manifests = fetched(&guide_transport(), &["repo"]);
    let resolved = resolve(&manifests, "repo://guide/intro.md#setup").unwrap();
    assert_eq!(resolved.target.fragment(), Some("setup"));
    assert_eq!(resolved.url, "/guide/intro#setup");
}

#[test]
fn test_scenario_b_unknown_anchor() {
    let manifests = fetched(&guide_transport(), &["repo"]);
    let failure = resolve(&manifests, "repo://guide/intro.md#missing").unwrap_err();
    assert!(matches!(failure, ResolutionError::UnknownAnchor { ref anchor, .. } if anchor == "missing"));
}

#[test]
fn test_scenario_c_fan_out() {
    let manifests = fetched(&guide_transport(), &["repo"]);

    let resolved = resolve(&manifests, "repo://old/path.md#x").unwrap();
    assert_eq!(resolved.output_path, "new/a");
    assert_eq!(resolved.target.fragment(), Some("y"));

    let failure = resolve(&manifests, "repo://old/path.md").unwrap_err();
    assert!(matches!(failure, ResolutionError::AmbiguousRedirect { .. }));
}

#[test]
fn test_redirect_idempotence() {
    let manifests = fetched(&guide_transport(), &["repo"]);
    let via_redirect = resolve(&manifests, "repo://old/path.md#x").unwrap();
    let direct = resolve(&manifests, "repo://new/a.md#y").unwrap();
    assert_eq!(via_redirect.output_path, direct.output_path);
    assert_eq!(via_redirect.url, direct.url);
}

#[test]
fn test_declared_but_unpublished_is_a_warning() {
    let manifests = fetched(&guide_transport(), &["repo", "apm-server"]);
    let failure = resolve(&manifests, "apm-server://guide/index.md").unwrap_err();
    assert!(matches!(failure, ResolutionError::NotPublishedYet { .. }));
    assert_eq!(failure.severity(false), docmesh::diagnostics::Severity::Warning);
    assert_eq!(failure.severity(true), docmesh::diagnostics::Severity::Error);

    let failure = resolve(&manifests, "beats://guide/index.md").unwrap_err();
    assert!(matches!(failure, ResolutionError::NotDeclared { .. }));
}

#[test]
fn test_scenario_d_duplicate_prefix_aborts_assembly() {
    let yaml = r#"
toc:
  - toc: elasticsearch://reference
    path_prefix: reference/es/
  - toc: kibana://reference
    path_prefix: Reference/ES
"#;
    let declaration = NavigationDeclaration::parse(yaml, &NavigationOptions::default()).unwrap();
    let error = NavigationAssembler::new(&declaration).build_index().unwrap_err();
    assert!(matches!(error, Error::DuplicatePathPrefix { .. }));
}

#[test]
fn test_scenario_e_collision_unless_phantom() {
    let transport = InMemoryTransport::new()
        .serve(
            REGISTRY_URL,
            &registry_json(&[("a", "main", "1"), ("b", "main", "1")]),
        )
        .serve(
            "https://links.test/a/main/links.json",
            r#"{ "links": { "x/y.md": {} } }"#,
        )
        .serve(
            "https://links.test/b/main/links.json",
            r#"{ "links": { "index.md": {} } }"#,
        );
    let manifests = fetched(&transport, &["a", "b"]);

    let mut builder = PrefixIndexBuilder::new();
    builder.register(SourceUri::new("a", "x"), "x").unwrap();
    builder.register(SourceUri::new("b", ""), "x/y").unwrap();
    let index = builder.build();

    let collisions = consistency::check(manifests.manifests(), &index, &PhantomSet::new());
    assert_eq!(collisions.len(), 1);
    assert_eq!(collisions[0].path, "x/y/");
    assert_eq!(collisions[0].first, "a");
    assert_eq!(collisions[0].second, "b");

    let phantoms: PhantomSet = ["x/y/"].into_iter().collect();
    assert!(consistency::check(manifests.manifests(), &index, &phantoms).is_empty());
}

#[test]
fn test_resolution_through_navigation_and_environment() {
    let transport = InMemoryTransport::new()
        .serve(
            REGISTRY_URL,
            &registry_json(&[("elasticsearch", "main", "1")]),
        )
        .serve(
            "https://links.test/elasticsearch/main/links.json",
            r#"{ "links": { "reference/setup/index.md": { "anchors": ["jvm"] } } }"#,
        );
    let manifests = fetched(&transport, &["elasticsearch"]);

    let yaml = r#"
toc:
  - toc: reference
    children:
      - repo: elasticsearch
"#;
    let declaration = NavigationDeclaration::parse(yaml, &NavigationOptions::default()).unwrap();
    let index = NavigationAssembler::new(&declaration).build_index().unwrap();
    let builder = PublishUrlBuilder::new("https://www.example.com", Some("guide")).unwrap();

    let resolver = CrossLinkResolver::new(&manifests, Some(&index), &builder);
    let resolved = resolver
        .resolve(&CrossLinkReference::parse("elasticsearch://reference/setup/index.md#jvm").unwrap())
        .unwrap();
    assert_eq!(resolved.output_path, "reference/elasticsearch/setup");
    assert!(resolved.url.starts_with("https://www.example.com/guide/"));
    assert!(resolved.url.ends_with("reference/elasticsearch/setup#jvm"));
}
