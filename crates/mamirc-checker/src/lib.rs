//! # MamIRC Checker
//!
//! Integrity checking for MamIRC connection archives.
//!
//! Every logical IRC connection in the archive must replay as
//! `connect`, then optionally `opened` and traffic, then `closed`, with
//! sequence numbers counting up from zero. The checker streams each
//! connection through a lifecycle state machine and reports every deviation
//! as a severity-tagged [`Diagnostic`], without letting one bad connection
//! stop the rest of the run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mamirc_checker::{check_archive, CheckerConfig, DiagnosticsReporter};
//!
//! let mut reporter = DiagnosticsReporter::new(std::io::stderr());
//! let status = check_archive("MamircArchive.sqlite", &CheckerConfig::default(), &mut reporter)?;
//! std::process::exit(status.code().into());
//! ```
//!
//! Also provides the per-connection statistics report in [`stats`].

pub mod checker;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod reporter;
pub mod stats;
pub mod validator;

pub use checker::{IntegrityChecker, IntegrityReport, RunStatus};
pub use config::CheckerConfig;
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity, SeverityCounts};
pub use error::{CheckError, CheckResult};
pub use lifecycle::{LifecycleInput, LifecycleState, Transition};
pub use reporter::{DiagnosticsReporter, ExitStatus};
pub use validator::{ConnectionOutcome, ConnectionReport, ConnectionValidator};

use std::io::{self, Write};
use std::path::Path;

use mamirc_storage::SqliteEventStore;
use tracing::{info, instrument};

/// Check one archive file end to end
///
/// Opens the archive read-only, runs every check, and writes the verdict.
/// A missing or unopenable file is reported as a fatal diagnostic, not an
/// error.
///
/// # Errors
///
/// Only fails if writing to the reporter fails.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn check_archive<W: Write>(
    path: impl AsRef<Path>,
    config: &CheckerConfig,
    reporter: &mut DiagnosticsReporter<W>,
) -> io::Result<ExitStatus> {
    let path = path.as_ref();
    reporter.emit(Diagnostic::info(
        DiagnosticKind::Archive,
        format!("Checking archive file: {}", path.display()),
    ));

    let report = match SqliteEventStore::open(path, config.open_options()) {
        Ok(store) => IntegrityChecker::new(&store)
            .with_missing_id_warnings(config.report_missing_connection_ids)
            .run(reporter),
        Err(err) => {
            info!(error = %err, "Could not open archive");
            checker::aborted(&err, reporter)
        }
    };

    reporter.finish(&report)
}
