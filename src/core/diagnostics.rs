//! Diagnostic reporting.
//!
//! The environment module never decides how problems are shown to a user; it
//! hands a [`Diagnostic`] to whatever [`DiagnosticSink`] the session carries and
//! moves on. [`LogSink`] forwards to the `log` facade, [`CollectingSink`] keeps
//! everything in memory for inspection.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// How serious a reported problem is. `Deadly` terminates the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Deadly,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Deadly => "deadly",
        };
        f.write_str(name)
    }
}

/// Source position attached to a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub code: u32,
    pub position: Option<Position>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "{} [E{}]: {}", self.severity, self.code, self.message)
    }
}

/// Receiver of diagnostics. Reports are fire-and-forget.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Sink that writes through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Note => log::info!("{}", diagnostic),
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error | Severity::Deadly => log::error!("{}", diagnostic),
        }
    }
}

/// Sink that stores every diagnostic. Clones share the same storage, so one
/// clone can be handed to a session and the other kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    reports: Rc<RefCell<Vec<Diagnostic>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.reports.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.reports.borrow_mut().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_shares_storage() {
        let sink = CollectingSink::new();
        let mut handed_out = sink.clone();
        handed_out.report(&Diagnostic {
            severity: Severity::Warning,
            message: "shadowed".to_string(),
            code: 7,
            position: Some(Position::new(3, 14)),
        });
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.diagnostics()[0].to_string(), "3:14: warning [E7]: shadowed");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Deadly > Severity::Error);
        assert!(Severity::Warning > Severity::Note);
    }
}
