//! Line-per-diagnostic output and exit statuses

use std::io::{self, Write};
use std::process::ExitCode;

use crate::checker::{IntegrityReport, RunStatus};
use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity, SeverityCounts};

/// Process exit status of the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    Success = 0,
    IntegrityFailure = 1,
    // 2 is taken by command-line usage errors
    StructuralFailure = 3,
    IoFailure = 4,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<RunStatus> for ExitStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Passed => Self::Success,
            RunStatus::Failed => Self::IntegrityFailure,
            RunStatus::StructuralFailure => Self::StructuralFailure,
            RunStatus::IoFailure => Self::IoFailure,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Writes each diagnostic as one line the moment it is emitted
///
/// Nothing is buffered beyond the writer's own buffer, so logs of any size
/// are reported in constant memory. A write failure is remembered and
/// returned by [`finish`](Self::finish); later diagnostics are dropped.
pub struct DiagnosticsReporter<W: Write> {
    writer: W,
    min_severity: Severity,
    counts: SeverityCounts,
    write_error: Option<io::Error>,
}

impl<W: Write> DiagnosticsReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            min_severity: Severity::Info,
            counts: SeverityCounts::default(),
            write_error: None,
        }
    }

    /// Only print diagnostics at or above `severity` (they are still counted)
    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Diagnostics seen so far, per severity
    pub fn counts(&self) -> SeverityCounts {
        self.counts
    }

    /// Write the verdict line and map the outcome to an exit status
    ///
    /// # Errors
    ///
    /// Returns the first error hit while writing any line.
    pub fn finish(&mut self, report: &IntegrityReport) -> io::Result<ExitStatus> {
        let verdict = match report.status {
            RunStatus::Passed => Diagnostic::info(
                DiagnosticKind::Archive,
                "Integrity checks passed for this archive",
            ),
            RunStatus::Failed => {
                Diagnostic::error(DiagnosticKind::Archive, "Some integrity checks failed")
            }
            RunStatus::StructuralFailure | RunStatus::IoFailure => {
                Diagnostic::error(DiagnosticKind::Archive, "Integrity check aborted")
            }
        };
        self.write_line(&verdict);
        if self.write_error.is_none() {
            if let Err(err) = self.writer.flush() {
                self.write_error = Some(err);
            }
        }

        match self.write_error.take() {
            Some(err) => Err(err),
            None => Ok(report.status.into()),
        }
    }

    /// Get back the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, diagnostic: &Diagnostic) {
        if self.write_error.is_some() {
            return;
        }
        if let Err(err) = writeln!(self.writer, "{diagnostic}") {
            self.write_error = Some(err);
        }
    }
}

impl<W: Write> DiagnosticSink for DiagnosticsReporter<W> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.counts.record(diagnostic.severity);
        if diagnostic.severity >= self.min_severity {
            self.write_line(&diagnostic);
        }
    }
}
