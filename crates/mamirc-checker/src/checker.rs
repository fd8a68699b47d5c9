//! Whole-archive integrity run
//!
//! The run goes: structural check, statistics, then every connection in
//! ascending ID order through a [`ConnectionValidator`](crate::validator::ConnectionValidator).
//! A failing structural check or a storage error ends the run at once;
//! integrity problems inside one connection never stop its siblings.

use mamirc_core::ConnectionId;
use mamirc_storage::{EventStore, StorageError};
use tracing::{debug, info, instrument, warn};

use crate::diagnostic::{CountingSink, Diagnostic, DiagnosticKind, DiagnosticSink, SeverityCounts};
use crate::validator;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Structural check passed and no Error-level diagnostics
    Passed,
    /// At least one Error-level diagnostic
    Failed,
    /// The storage engine reported structural corruption
    StructuralFailure,
    /// The archive could not be read
    IoFailure,
}

/// Aggregate result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub status: RunStatus,
    /// Whether any Error-level diagnostic was emitted
    pub has_error: bool,
    pub total_events: Option<u64>,
    pub connections_checked: u64,
    pub events_checked: u64,
    pub counts: SeverityCounts,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

#[derive(Debug, Default)]
struct Progress {
    has_error: bool,
    total_events: Option<u64>,
    connections_checked: u64,
    events_checked: u64,
}

/// Runs every check over one event store
pub struct IntegrityChecker<'s, S: EventStore + ?Sized> {
    store: &'s S,
    report_missing_ids: bool,
}

impl<'s, S: EventStore + ?Sized> IntegrityChecker<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            report_missing_ids: true,
        }
    }

    /// Enable or disable warnings for unused connection IDs
    pub fn with_missing_id_warnings(mut self, enabled: bool) -> Self {
        self.report_missing_ids = enabled;
        self
    }

    /// Run all checks, streaming diagnostics to `sink`
    #[instrument(skip_all)]
    pub fn run(&self, sink: &mut dyn DiagnosticSink) -> IntegrityReport {
        let mut sink = CountingSink::new(sink);
        let mut progress = Progress::default();

        let status = match self.check_all(&mut sink, &mut progress) {
            Ok(()) if progress.has_error => RunStatus::Failed,
            Ok(()) => RunStatus::Passed,
            Err(err) => {
                warn!(error = %err, "Integrity run aborted");
                let (status, diagnostic) = fatal_diagnostic(&err);
                sink.emit(diagnostic);
                progress.has_error = true;
                status
            }
        };

        info!(
            ?status,
            connections = progress.connections_checked,
            events = progress.events_checked,
            "Integrity run finished"
        );

        IntegrityReport {
            status,
            has_error: progress.has_error,
            total_events: progress.total_events,
            connections_checked: progress.connections_checked,
            events_checked: progress.events_checked,
            counts: sink.counts,
        }
    }

    fn check_all(
        &self,
        sink: &mut CountingSink<'_>,
        progress: &mut Progress,
    ) -> Result<(), StorageError> {
        self.store.structural_check()?;
        sink.emit(Diagnostic::info(
            DiagnosticKind::Archive,
            "Structural integrity check passed",
        ));

        let total = self.store.total_event_count()?;
        progress.total_events = Some(total);
        sink.emit(Diagnostic::info(
            DiagnosticKind::Archive,
            format!("Number of events: {total}"),
        ));

        let message = match self.store.connection_id_range()? {
            Some((low, high)) => format!("Connection ID range: {low} to {high}"),
            None => "No connections in archive".to_string(),
        };
        sink.emit(Diagnostic::info(DiagnosticKind::Archive, message));

        // Next non-negative ID we expect to see if IDs are dense
        let mut next_expected: i64 = 0;

        for id in self.store.connection_ids() {
            let id = id?;

            if id.is_valid() {
                if self.report_missing_ids {
                    for missing in next_expected..id.value() {
                        sink.emit(
                            Diagnostic::warning(
                                DiagnosticKind::MissingConnectionId,
                                "connection ID has no events",
                            )
                            .for_connection(ConnectionId(missing)),
                        );
                    }
                }
                next_expected = id.value().saturating_add(1);
            } else {
                sink.emit(
                    Diagnostic::error(
                        DiagnosticKind::NegativeConnectionId,
                        "negative connection ID",
                    )
                    .for_connection(id),
                );
                progress.has_error = true;
            }

            let outcome = validator::validate(id, self.store.events_for(id), sink)?;
            debug!(
                connection_id = %id,
                events = outcome.events_checked,
                has_error = outcome.has_error,
                "Checked connection"
            );

            progress.connections_checked += 1;
            progress.events_checked += outcome.events_checked;
            progress.has_error |= outcome.has_error;
        }

        let counts = sink.counts;
        sink.emit(Diagnostic::info(
            DiagnosticKind::Archive,
            format!(
                "Checked {} connections and {} events: {} errors, {} warnings",
                progress.connections_checked,
                progress.events_checked,
                counts.errors,
                counts.warnings
            ),
        ));
        Ok(())
    }
}

/// Report a run that ended before the store could be opened
pub fn aborted(err: &StorageError, sink: &mut dyn DiagnosticSink) -> IntegrityReport {
    let (status, diagnostic) = fatal_diagnostic(err);
    let mut counts = SeverityCounts::default();
    counts.record(diagnostic.severity);
    sink.emit(diagnostic);
    IntegrityReport {
        status,
        has_error: true,
        total_events: None,
        connections_checked: 0,
        events_checked: 0,
        counts,
    }
}

/// Classify a storage error that ended the run
fn fatal_diagnostic(err: &StorageError) -> (RunStatus, Diagnostic) {
    let (status, kind, message) = if err.is_structural() {
        (
            RunStatus::StructuralFailure,
            DiagnosticKind::StructuralCorruption,
            format!("Archive is structurally corrupt: {err}"),
        )
    } else {
        (
            RunStatus::IoFailure,
            DiagnosticKind::Io,
            format!("Failed to read archive: {err}"),
        )
    };
    (status, Diagnostic::error(kind, message).fatal())
}
