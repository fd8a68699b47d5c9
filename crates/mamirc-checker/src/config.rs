//! Checker configuration
//!
//! Every field has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! report_missing_connection_ids = false
//! busy_timeout_ms = 5000
//!
//! [log]
//! default_level = "debug"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use mamirc_logging::LogConfig;
use mamirc_storage::sqlite::{DEFAULT_BUSY_TIMEOUT, DEFAULT_PAGE_SIZE};
use mamirc_storage::ArchiveOpenOptions;
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, CheckResult};

/// Configuration for an integrity-check run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// Warn about connection IDs in `[0, max]` that have no events
    pub report_missing_connection_ids: bool,
    /// How long a read waits for the connector's write lock
    pub busy_timeout_ms: u64,
    /// Rows fetched per page when streaming events
    pub page_size: usize,
    /// Logging for the command-line tools
    pub log: LogConfig,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            report_missing_connection_ids: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            page_size: DEFAULT_PAGE_SIZE,
            log: LogConfig::command_line(),
        }
    }
}

impl CheckerConfig {
    /// Load a configuration file, filling unspecified keys with defaults
    pub fn load(path: impl AsRef<Path>) -> CheckResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CheckError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| CheckError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_missing_id_warnings(mut self, enabled: bool) -> Self {
        self.report_missing_connection_ids = enabled;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Options for opening the archive
    pub fn open_options(&self) -> ArchiveOpenOptions {
        ArchiveOpenOptions::default()
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_page_size(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CheckerConfig::default();
        assert!(config.report_missing_connection_ids);
        assert_eq!(config.busy_timeout_ms, 60_000);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.log.default_level, "warn");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("checker.toml");
        fs::write(
            &path,
            "report_missing_connection_ids = false\n\n[log]\ndefault_level = \"debug\"\n",
        )
        .unwrap();

        let config = CheckerConfig::load(&path).unwrap();
        assert!(!config.report_missing_connection_ids);
        assert_eq!(config.page_size, 1000);
        assert_eq!(config.log.default_level, "debug");
    }

    #[test]
    fn test_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let missing = CheckerConfig::load(temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(CheckError::ConfigRead { .. })));

        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "page_size = \"lots\"").unwrap();
        assert!(matches!(
            CheckerConfig::load(&path),
            Err(CheckError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_open_options_clamp_page_size() {
        let options = CheckerConfig::default()
            .with_page_size(0)
            .with_busy_timeout(Duration::from_millis(250))
            .open_options();
        assert_eq!(options.page_size, 1);
        assert_eq!(options.busy_timeout, Duration::from_millis(250));
    }
}
