//! # Error Handling
//!
//! This module defines the error type for infrastructure failures in
//! `docmesh`: configuration and navigation parsing, registry and manifest
//! decoding, network transport, cache I/O and cancellation.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum for failures that stop an operation. Each
//!   variant carries enough context (repository, URL, path) to render a
//!   useful message without a backtrace.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Failures that are shaped by the data being processed rather than by the
//! environment are deliberately *not* represented here. A cross-link that
//! points at an unknown page is a [`crate::resolver::ResolutionError`], and
//! two repositories claiming the same global path is a
//! [`crate::consistency::CollisionError`]. Those are collected into
//! diagnostics and never abort processing of unrelated documents.

use thiserror::Error;

/// Main error type for docmesh operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing the `docmesh.yaml` build configuration.
    ///
    /// Optionally carries a hint describing how to fix the problem.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The navigation declaration is malformed.
    #[error("Navigation parsing error in {source_file}: {message}")]
    NavigationParse {
        source_file: String,
        message: String,
    },

    /// The navigation declaration nests deeper than the configured bound.
    #[error("Navigation declaration exceeds maximum depth of {max_depth} at '{source_uri}'")]
    NavigationTooDeep { source_uri: String, max_depth: usize },

    /// Two navigation nodes declare the same global path prefix.
    #[error("Duplicate path prefix '{path_prefix}' declared by '{existing}' and '{duplicate}'")]
    DuplicatePathPrefix {
        path_prefix: String,
        existing: String,
        duplicate: String,
    },

    /// The same repository source is bound by more than one navigation node.
    #[error("'{source_uri}' is bound more than once in the navigation declaration")]
    DuplicateNavigationSource { source_uri: String },

    /// A registry index or repository manifest could not be decoded.
    #[error("Failed to parse manifest for '{repository}': {message}")]
    ManifestParse { repository: String, message: String },

    /// A repository has no registry entry for any of the preferred branches.
    #[error("'{repository}' has no published manifest on any of the branches: {}", branches.join(", "))]
    BranchNotFound {
        repository: String,
        branches: Vec<String>,
    },

    /// A network fetch failed after exhausting its retries.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// The remote answered with a non-retryable HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The remote reported that a resource does not exist.
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// An error occurred with a cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// A cross-link string could not be parsed as a `scheme://path` URI.
    #[error("Invalid cross link '{link}': {message}")]
    InvalidCrossLink { link: String, message: String },

    /// The bounded worker pool for the fetch phase could not be created.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// A shared lock was poisoned by a panicking thread.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for docmesh operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is worth retrying.
    ///
    /// Only transport-level failures are transient. A resource that does not
    /// exist will not appear on a second attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_with_hint() {
        let err = Error::ConfigParse {
            message: "unknown field `registri`".to_string(),
            hint: Some("did you mean `registry`?".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("unknown field `registri`"));
        assert!(text.contains("hint: did you mean `registry`?"));
    }

    #[test]
    fn test_config_parse_without_hint() {
        let err = Error::ConfigParse {
            message: "missing field".to_string(),
            hint: None,
        };
        assert!(!err.to_string().contains("hint"));
    }

    #[test]
    fn test_duplicate_prefix_names_both_sources() {
        let err = Error::DuplicatePathPrefix {
            path_prefix: "reference/es".to_string(),
            existing: "elasticsearch://reference/".to_string(),
            duplicate: "kibana://reference/".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("elasticsearch://reference/"));
        assert!(text.contains("kibana://reference/"));
    }

    #[test]
    fn test_branch_not_found_lists_branches() {
        let err = Error::BranchNotFound {
            repository: "apm-agent".to_string(),
            branches: vec!["main".to_string(), "master".to_string()],
        };
        assert!(err.to_string().ends_with("main, master"));
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(Error::Network {
            url: "https://example.com".to_string(),
            message: "timed out".to_string()
        }
        .is_transient());
        assert!(!Error::NotFound {
            url: "https://example.com".to_string()
        }
        .is_transient());
        assert!(!Error::Cancelled {
            operation: "fetch".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
