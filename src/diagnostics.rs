//! Diagnostics collected during a build.
//!
//! Data-shaped failures never abort a build. They are emitted into a
//! [`DiagnosticsCollector`] together with the document (and line, when the
//! caller knows it) that triggered them, so one run reports every problem.
//! The collector is shared between worker threads.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use serde::Serialize;

use crate::resolver::ResolutionError;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Document, repository or file the problem was found in.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}", self.source, line, self.message),
            None => write!(f, "{}: {}", self.source, self.message),
        }
    }
}

/// Thread-safe sink for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsCollector {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
    strict: bool,
}

impl DiagnosticsCollector {
    pub fn new(strict: bool) -> Self {
        Self {
            diagnostics: Arc::default(),
            strict,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a diagnostic. Rendering is left to the caller.
    pub fn emit(&self, diagnostic: Diagnostic) {
        debug!("{}: {}", diagnostic.severity, diagnostic);
        self.lock().push(diagnostic);
    }

    pub fn emit_error(&self, source: &str, message: impl Into<String>) {
        self.emit(Diagnostic {
            severity: Severity::Error,
            source: source.to_string(),
            line: None,
            message: message.into(),
        });
    }

    pub fn emit_warning(&self, source: &str, message: impl Into<String>) {
        self.emit(Diagnostic {
            severity: Severity::Warning,
            source: source.to_string(),
            line: None,
            message: message.into(),
        });
    }

    /// Record a failed resolution at the severity its kind carries.
    pub fn emit_resolution(&self, source: &str, line: Option<usize>, failure: &ResolutionError) {
        self.emit(Diagnostic {
            severity: failure.severity(self.strict),
            source: source.to_string(),
            line,
            message: failure.to_string(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    /// Whether the build should fail. In strict mode warnings count too.
    pub fn has_failures(&self) -> bool {
        self.error_count() > 0 || (self.strict && self.warning_count() > 0)
    }

    /// A snapshot of everything emitted so far, in emission order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }
}
