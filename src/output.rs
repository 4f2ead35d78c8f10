//! # Output Configuration
//!
//! Controls how `docmesh` renders reports: colours and emoji depend on the
//! terminal and on user preferences, and diagnostics and collisions are
//! formatted here so every command prints them the same way.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docmesh::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Resolving...", emoji(&config, "🔗", "[LINK]"));
//! ```

use std::env;

use console::style;

use crate::consistency::{CollisionError, NamespaceViolation};
use crate::diagnostics::{Diagnostic, Severity};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `color_flag` is the value of `--color`: `always` forces colours on
    /// (overriding `NO_COLOR`), `never` forces them off, and anything else
    /// detects support from the environment and the terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Render one diagnostic as a single line.
pub fn format_diagnostic(config: &OutputConfig, diagnostic: &Diagnostic) -> String {
    let label = match diagnostic.severity {
        Severity::Error => emoji(config, "❌", "[ERROR]"),
        Severity::Warning => emoji(config, "⚠️ ", "[WARN]"),
    };
    if config.use_color {
        let text = diagnostic.to_string();
        let text = match diagnostic.severity {
            Severity::Error => style(text).red().to_string(),
            Severity::Warning => style(text).yellow().to_string(),
        };
        format!("{} {}", label, text)
    } else {
        format!("{} {}", label, diagnostic)
    }
}

/// Render a collision report, grouped by the first claimant.
pub fn format_collisions(config: &OutputConfig, collisions: &[CollisionError]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;
    for collision in collisions {
        if current != Some(collision.first.as_str()) {
            current = Some(collision.first.as_str());
            let heading = format!("{}://", collision.first);
            let heading = if config.use_color {
                style(heading).bold().to_string()
            } else {
                heading
            };
            out.push_str(&heading);
            out.push('\n');
        }
        out.push_str(&format!(
            "  {} {} <- {}://{} (already claimed by {})\n",
            emoji(config, "💥", "[COLLISION]"),
            collision.path,
            collision.second,
            collision.second_document,
            collision.first_document
        ));
    }
    out
}

/// Render namespace violations, one per line.
pub fn format_violations(config: &OutputConfig, violations: &[NamespaceViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}: {}\n", emoji(config, "🚫", "[NAMESPACE]"), v.repository, v))
        .collect()
}
