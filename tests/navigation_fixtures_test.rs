//! Data-driven tests over the navigation declarations in
//! `tests/testdata/navigation`.
//!
//! Every `*.yml` file is parsed and assembled into a prefix index. Files
//! whose name starts with `invalid-` must be rejected; all others must
//! produce an index with a binding for every declared node.

use std::path::Path;

use docmesh::navigation::{NavigationAssembler, NavigationDeclaration, NavigationOptions};

fn test_navigation_fixture(path: &Path) -> datatest_stable::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Unreadable fixture name: {}", path.display()))?;
    let expect_invalid = file_name.starts_with("invalid-");

    let result = NavigationDeclaration::from_file(path, &NavigationOptions::default()).and_then(
        |declaration| {
            let index = NavigationAssembler::new(&declaration).build_index()?;
            Ok((declaration, index))
        },
    );

    match (result, expect_invalid) {
        (Ok((declaration, index)), false) => {
            let nodes = declaration.walk().len();
            assert_eq!(
                index.len(),
                nodes,
                "{} declares {} node(s) but the index has {} binding(s)",
                path.display(),
                nodes,
                index.len()
            );
            for (_, node) in declaration.walk() {
                assert!(
                    !node.path_prefix.is_empty(),
                    "{}: {} has an empty path prefix",
                    path.display(),
                    node.source
                );
            }
            Ok(())
        }
        (Err(e), true) => {
            assert!(!e.to_string().is_empty());
            Ok(())
        }
        (Ok(_), true) => Err(format!("{} was expected to be rejected", path.display()).into()),
        (Err(e), false) => Err(format!("Failed to assemble {}: {}", path.display(), e).into()),
    }
}

datatest_stable::harness!(
    test_navigation_fixture,
    "tests/testdata/navigation",
    r"^.*\.yml$"
);
