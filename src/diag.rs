//! Diagnostics - the engine's observability seam.
//!
//! Recoverable failures (dropped filters, unresolvable sort keys, unknown
//! scopes) never abort a request; they degrade locally and are reported
//! here. The sink is injected so the engine stays unit-testable without
//! global state: tests use [`MemorySink`], production code typically uses
//! [`LogSink`] which forwards to the `log` facade.

use std::sync::{Arc, Mutex};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

/// A single diagnostic event emitted during request processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Engine component that produced the event (e.g. "planner").
    pub component: &'static str,
    pub message: String,
}

/// Where diagnostics go.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Default sink: forwards to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Info => log::info!("{}: {}", diagnostic.component, diagnostic.message),
            Severity::Warning => log::warn!("{}: {}", diagnostic.component, diagnostic.message),
        }
    }
}

/// Collecting sink for tests and request-scoped inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics, in emission order.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().expect("diagnostic sink poisoned").clone()
    }

    /// Just the messages, for quick assertions.
    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|d| d.message).collect()
    }

    /// True when any recorded diagnostic message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|d| d.message.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.records
            .lock()
            .expect("diagnostic sink poisoned")
            .push(diagnostic);
    }
}

/// Cheap, cloneable handle the engine threads through its components.
#[derive(Clone)]
pub struct Diagnostics {
    sink: Arc<dyn DiagnosticSink>,
}

impl Diagnostics {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { sink }
    }

    /// Handle backed by the `log` facade.
    pub fn log() -> Self {
        Self::new(Arc::new(LogSink))
    }

    pub fn info(&self, component: &'static str, message: impl Into<String>) {
        self.sink.emit(Diagnostic {
            severity: Severity::Info,
            component,
            message: message.into(),
        });
    }

    pub fn warn(&self, component: &'static str, message: impl Into<String>) {
        self.sink.emit(Diagnostic {
            severity: Severity::Warning,
            component,
            message: message.into(),
        });
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Diagnostics")
    }
}
