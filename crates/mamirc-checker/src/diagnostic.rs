//! Severity-tagged findings produced while checking an archive

use std::fmt;

use mamirc_core::ConnectionId;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Run-level information: file, statistics, progress
    Archive,
    /// The storage engine's own consistency check failed
    StructuralCorruption,
    /// The archive could not be read (missing file, busy timeout, ...)
    Io,
    /// A sequence number was skipped or repeated
    SequenceGap,
    /// The `type` column holds an unknown value
    UnexpectedEventType,
    /// A connection payload decoded to none of the known commands
    MalformedPayload,
    /// A connection payload is not valid UTF-8
    Decode,
    /// An event arrived in a lifecycle state that does not allow it
    LifecycleViolation,
    /// A connection ID below zero
    NegativeConnectionId,
    /// A connection ID in `[0, max]` with no events
    MissingConnectionId,
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub connection_id: Option<ConnectionId>,
    pub sequence: Option<i64>,
    pub message: String,
    /// Whether this finding ended the enclosing scope (one connection, or the whole run)
    pub fatal: bool,
}

impl Diagnostic {
    fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            connection_id: None,
            sequence: None,
            message: message.into(),
            fatal: false,
        }
    }

    /// Create an informational diagnostic
    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }

    /// Create a warning
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    /// Create an error
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    /// Attach the connection this finding concerns
    pub fn for_connection(mut self, connection_id: ConnectionId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    /// Attach the connection and sequence number this finding concerns
    pub fn at(mut self, connection_id: ConnectionId, sequence: i64) -> Self {
        self.connection_id = Some(connection_id);
        self.sequence = Some(sequence);
        self
    }

    /// Mark this finding as ending its scope
    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Renders as `[SEVERITY] connection <id>, sequence <n>: <message>`,
/// omitting the location parts that do not apply.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity)?;
        match (self.connection_id, self.sequence) {
            (Some(id), Some(sequence)) => write!(f, "connection {}, sequence {}: ", id, sequence)?,
            (Some(id), None) => write!(f, "connection {}: ", id)?,
            (None, Some(sequence)) => write!(f, "sequence {}: ", sequence)?,
            (None, None) => {}
        }
        write!(f, "{}", self.message)
    }
}

/// Receiver of diagnostics as they are produced
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, diagnostic: Diagnostic) {
        (**self).emit(diagnostic);
    }
}

/// Per-severity totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub info: u64,
    pub warnings: u64,
    pub errors: u64,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Info => self.info += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Error => self.errors += 1,
        }
    }
}

/// Forwards diagnostics while counting them
pub(crate) struct CountingSink<'a> {
    inner: &'a mut dyn DiagnosticSink,
    pub(crate) counts: SeverityCounts,
}

impl<'a> CountingSink<'a> {
    pub(crate) fn new(inner: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            inner,
            counts: SeverityCounts::default(),
        }
    }
}

impl DiagnosticSink for CountingSink<'_> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.counts.record(diagnostic.severity);
        self.inner.emit(diagnostic);
    }
}
