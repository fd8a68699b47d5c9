//! Integrity checker for MamIRC connection archives
//!
//! Safe to run against an archive the connector is still writing to: the
//! checker reads one snapshot and never blocks the writer.
//!
//! # Usage
//!
//! ```bash
//! mamirc-checker MamircArchive.sqlite
//!
//! # Only warnings and errors, no missing-ID warnings
//! mamirc-checker --quiet --no-missing-id-warnings MamircArchive.sqlite
//!
//! # Internal tracing to stderr as well
//! mamirc-checker --log-level debug --pretty MamircArchive.sqlite
//! ```
//!
//! Exit status: 0 pass, 1 integrity errors, 2 usage error, 3 structural
//! corruption, 4 unreadable archive.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use mamirc_checker::{check_archive, CheckerConfig, DiagnosticsReporter, ExitStatus, Severity};
use mamirc_logging::MamircSubscriberBuilder;
use tracing::error;

#[derive(Parser)]
#[command(name = "mamirc-checker")]
#[command(about = "Check the integrity of a MamIRC archive database")]
#[command(version)]
struct Args {
    /// Path to the archive database
    archive: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Don't warn about connection IDs that have no events
    #[arg(long)]
    no_missing_id_warnings: bool,

    /// Rows fetched per page while streaming events
    #[arg(long)]
    page_size: Option<usize>,

    /// How long to wait for the connector's write lock, in milliseconds
    #[arg(long)]
    busy_timeout_ms: Option<u64>,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Log level for internal tracing (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Use pretty tracing output instead of JSONL
    #[arg(short, long)]
    pretty: bool,
}

impl Args {
    fn checker_config(&self) -> Result<CheckerConfig, mamirc_checker::CheckError> {
        let mut config = match &self.config {
            Some(path) => CheckerConfig::load(path)?,
            None => CheckerConfig::default(),
        };
        if self.no_missing_id_warnings {
            config = config.with_missing_id_warnings(false);
        }
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(ms) = self.busy_timeout_ms {
            config = config.with_busy_timeout(Duration::from_millis(ms));
        }
        if let Some(level) = &self.log_level {
            config.log.default_level = level.clone();
        }
        if self.pretty {
            config.log.console.pretty = true;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.checker_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            return ExitStatus::IoFailure.into();
        }
    };

    let _guard = match MamircSubscriberBuilder::new()
        .with_config(config.log.clone())
        .init()
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("[ERROR] {e}");
            return ExitStatus::IoFailure.into();
        }
    };

    let min_severity = if args.quiet {
        Severity::Warning
    } else {
        Severity::Info
    };
    let mut reporter = DiagnosticsReporter::new(std::io::stderr().lock()).with_min_severity(min_severity);

    match check_archive(&args.archive, &config, &mut reporter) {
        Ok(status) => status.into(),
        Err(e) => {
            error!(error = %e, "Failed to write diagnostics");
            ExitStatus::IoFailure.into()
        }
    }
}
