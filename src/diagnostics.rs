//! Source locations & diagnostics (spec component A).
//!
//! Diagnostics accumulate in a [`DiagnosticCollector`] until compilation
//! ends; they are never raised as Rust errors themselves (that's what
//! [`crate::error`] is for) — this module is for the side-channel record of
//! everything the lexer/parser/analyzer noticed along the way.

use crate::ast::Span;
use std::sync::Mutex;

#[cfg(feature = "serde-types")]
use serde::{Deserialize, Serialize};

/// The severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub enum Severity {
    /// A hard error; a compilation containing one is not a success.
    Error,
    /// A non-fatal warning.
    Warning,
    /// An informational note.
    Note,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        f.write_str(s)
    }
}

/// A single diagnostic: a severity, a message, an optional location, and
/// zero or more remediation hints.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    /// The diagnostic's severity.
    pub severity: Severity,
    /// The message text.
    pub message: String,
    /// An optional source location.
    pub span: Option<Span>,
    /// Remediation hints, rendered one per line.
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// Creates a new diagnostic with no hints.
    pub fn new(severity: Severity, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity,
            message: message.into(),
            span,
            hints: Vec::new(),
        }
    }

    /// Creates an error-severity diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, message, Some(span))
    }

    /// Creates a warning-severity diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Warning, message, Some(span))
    }

    /// Creates a note-severity diagnostic.
    pub fn note(message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Note, message, Some(span))
    }

    /// Attaches a remediation hint, builder-style.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Renders the diagnostic in the spec §6 pretty form:
    /// `{severity} [{loc}]: {message}\n  hint: {hint}*`.
    pub fn render(&self) -> String {
        let loc = self
            .span
            .map(|s| s.render())
            .unwrap_or_else(|| "-".to_string());
        let mut out = format!("{} [{}]: {}", self.severity, loc, self.message);
        for hint in &self.hints {
            out.push_str(&format!("\n  hint: {hint}"));
        }
        out
    }
}

/// A thread-safe sink for diagnostics produced during compilation.
///
/// Spec §5: "`DiagnosticCollector` is protected by a mutex to allow
/// auxiliary tools to read diagnostics concurrently, but during
/// compilation only one writer exists." The mutex buys correctness for the
/// concurrent-reader case without requiring compilation itself to be
/// anything but single-threaded.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .expect("diagnostic collector mutex poisoned")
            .push(diagnostic);
    }

    /// Returns a snapshot of all diagnostics recorded so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .expect("diagnostic collector mutex poisoned")
            .clone()
    }

    /// Returns true iff no error-severity diagnostic has been recorded.
    ///
    /// Spec §7: "A compilation is `success` iff no error-severity
    /// diagnostics were emitted."
    pub fn is_success(&self) -> bool {
        !self
            .diagnostics
            .lock()
            .expect("diagnostic collector mutex poisoned")
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns the number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.diagnostics
            .lock()
            .expect("diagnostic collector mutex poisoned")
            .len()
    }

    /// Returns true iff no diagnostics have been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_matches_pretty_form() {
        let diag = Diagnostic::error("undefined variable 'x'", Span::new(0, 1, 3, 7))
            .with_hint("did you mean 'y'?");
        let rendered = diag.render();
        assert_eq!(
            rendered,
            "error [3:7]: undefined variable 'x'\n  hint: did you mean 'y'?"
        );
    }

    #[test]
    fn collector_is_success_without_errors() {
        let collector = DiagnosticCollector::new();
        collector.push(Diagnostic::warning("unused variable 'z'", Span::default()));
        assert!(collector.is_success());
        collector.push(Diagnostic::error("boom", Span::default()));
        assert!(!collector.is_success());
        assert_eq!(collector.len(), 2);
    }
}
