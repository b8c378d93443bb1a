//! Non-fatal diagnostics and the per-session log.
//!
//! # Responsibility
//! - Carry recoverable per-line problems (unknown parts, skipped rows) out of
//!   the engine without aborting a resolution.
//! - Accumulate everything reported during one session so it can be written
//!   next to the outputs on every exit path.
//!
//! # Invariants
//! - Reporting never fails and never panics.
//! - `SessionLog` keeps entries in report order.

use log::{error, warn};
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable code, e.g. `part_not_found`.
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    /// Unknown IPN on a BOM line.
    ///
    /// `line_index` is zero based; the message reports the table row number
    /// (header is row 1).
    pub fn part_not_found(
        line_index: usize,
        cmp_name: &str,
        ipn: &str,
        err: &dyn std::error::Error,
    ) -> Self {
        Self::warning(
            "part_not_found",
            format!(
                "error finding part ({cmp_name}:{ipn}) on bom line #{} in partmaster: {err}",
                line_index + 2
            ),
        )
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.severity.as_str(),
            self.code,
            self.message
        )
    }
}

/// Destination for diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Session-scoped diagnostic log.
#[derive(Debug, Default)]
pub struct SessionLog {
    entries: Vec<Diagnostic>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the log as one entry per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }

    /// Writes the rendered log to `path`, replacing any previous content.
    pub fn flush_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())
    }
}

impl DiagnosticSink for SessionLog {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => warn!(
                "event=diagnostic module=session status=warning code={} message={}",
                diagnostic.code, diagnostic.message
            ),
            Severity::Error => error!(
                "event=diagnostic module=session status=error code={} message={}",
                diagnostic.code, diagnostic.message
            ),
        }
        self.entries.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::{Diagnostic, DiagnosticSink, SessionLog};

    #[test]
    fn session_log_keeps_order_and_renders_lines() {
        let mut log = SessionLog::new();
        log.report(Diagnostic::warning("first", "one"));
        log.report(Diagnostic::error("second", "two"));

        assert_eq!(log.entries().len(), 2);
        assert_eq!(
            log.render(),
            "warning [first] one\nerror [second] two\n"
        );
    }

    #[test]
    fn flush_writes_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("PCA-001-0001.log");
        let mut log = SessionLog::new();
        log.report(Diagnostic::warning("part_not_found", "missing CAP-001-0001"));

        log.flush_to(&path).expect("flush should succeed");
        let text = std::fs::read_to_string(&path).expect("log readable");
        assert!(text.contains("missing CAP-001-0001"));
    }
}
