//! Property-based tests for path normalisation and prefix matching.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{
        decode_path_component, encode_path_component, folder_prefixes, lookup_key, to_target_path,
    };
    use crate::prefix::{PrefixIndexBuilder, SourceUri};
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,7}"
    }

    fn relative_path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..5).prop_map(|s| s.join("/"))
    }

    // ============================================================================
    // to_target_path / lookup_key property tests
    // ============================================================================

    proptest! {
        /// Property: normalised paths never contain backslashes or surrounding slashes
        #[test]
        fn target_path_is_clean(input in ".*") {
            let result = to_target_path(&input);
            prop_assert!(!result.contains('\\'));
            prop_assert!(!result.starts_with('/'));
            prop_assert!(!result.ends_with('/'));
        }

        /// Property: lookups ignore ASCII case
        #[test]
        fn lookup_key_ignores_case(input in "[a-zA-Z0-9/._-]{0,40}") {
            prop_assert_eq!(lookup_key(&input), lookup_key(&input.to_ascii_uppercase()));
        }

        /// Property: the extension and separator style never change the key
        #[test]
        fn lookup_key_ignores_extension_and_separators(path in relative_path()) {
            let with_ext = format!("{}.md", path);
            let windows = with_ext.replace('/', "\\");
            prop_assert_eq!(lookup_key(&path), lookup_key(&with_ext));
            prop_assert_eq!(lookup_key(&path), lookup_key(&windows));
        }

        /// Property: an index leaf addresses its folder
        #[test]
        fn index_collapses_to_folder(path in relative_path()) {
            prop_assume!(!path.split('/').any(|s| s == "index"));
            let index = format!("{}/index.md", path);
            prop_assert_eq!(to_target_path(&index), to_target_path(&path));
        }

        /// Property: the same input always yields the same output
        #[test]
        fn target_path_is_deterministic(input in ".*") {
            prop_assert_eq!(to_target_path(&input), to_target_path(&input));
        }
    }

    // ============================================================================
    // folder_prefixes property tests
    // ============================================================================

    proptest! {
        /// Property: one prefix per segment, each extending the previous one
        #[test]
        fn folder_prefixes_are_nested(path in relative_path()) {
            let prefixes = folder_prefixes(&path);
            prop_assert_eq!(prefixes.len(), path.split('/').count());
            for pair in prefixes.windows(2) {
                prop_assert!(pair[1].starts_with(&pair[0]));
            }
            prop_assert!(prefixes.iter().all(|p| p.ends_with('/')));
        }
    }

    // ============================================================================
    // encode_path_component property tests
    // ============================================================================

    proptest! {
        /// Property: encoded components never contain separators
        #[test]
        fn encoded_component_has_no_separators(input in ".*") {
            let result = encode_path_component(&input);
            for ch in ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '-'] {
                prop_assert!(!result.contains(ch));
            }
        }

        /// Property: decoding gives back the original value
        #[test]
        fn encoded_component_decodes_to_input(input in ".*") {
            let encoded = encode_path_component(&input);
            prop_assert_eq!(decode_path_component(&encoded), Some(input));
        }
    }

    // ============================================================================
    // PrefixIndex property tests
    // ============================================================================

    proptest! {
        /// Property: a nested source always wins over its parent
        #[test]
        fn longest_prefix_wins(parent in segment(), child in segment(), leaf in segment()) {
            let mut builder = PrefixIndexBuilder::new();
            let parent_source = SourceUri::new("repo", &parent);
            let child_source = SourceUri::new("repo", &format!("{}/{}", parent, child));
            builder.register(parent_source, "global/parent").unwrap();
            builder.register(child_source, "global/child").unwrap();
            let index = builder.build();

            let lookup = format!("{}/{}/{}", parent, child, leaf);
            let matched = index.resolve("repo", &lookup).unwrap();
            prop_assert_eq!(matched.path_prefix(), "global/child");
            prop_assert_eq!(matched.output_path(), format!("global/child/{}", leaf));
        }

        /// Property: registering the same prefix twice is always rejected
        #[test]
        fn duplicate_prefixes_are_rejected(a in segment(), b in segment(), prefix in relative_path()) {
            prop_assume!(a != b);
            let mut builder = PrefixIndexBuilder::new();
            builder.register(SourceUri::new("one", &a), &prefix).unwrap();
            let upper = prefix.to_ascii_uppercase();
            let result = builder.register(SourceUri::new("two", &b), &format!("/{}/", upper));
            prop_assert!(result.is_err());
        }
    }
}
