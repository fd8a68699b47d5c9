//! Read-only SQLite archive access
//!
//! The archive is the connector's `events` table:
//!
//! ```sql
//! CREATE TABLE events(
//!     connectionId INTEGER NOT NULL,
//!     sequence INTEGER NOT NULL,
//!     timestamp INTEGER NOT NULL,
//!     type INTEGER NOT NULL,
//!     data BLOB NOT NULL,
//!     PRIMARY KEY(connectionId, sequence)
//! );
//! ```
//!
//! A [`SqliteEventStore`] holds one deferred read transaction for its whole
//! lifetime. The snapshot is taken at the first read, so a connector that
//! keeps appending in WAL mode is neither blocked nor partially observed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use mamirc_core::{ConnectionId, Event};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::paging::KeysetPages;
use crate::{ConnectionIdStream, EventStore, EventStream};

/// Default busy timeout, matching the connector's own write timeout
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of rows fetched per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Type code given to rows whose `type` column does not hold an integer
pub const NON_INTEGER_TYPE_CODE: i64 = -1;

const FIRST_EVENTS_PAGE: &str = "SELECT connectionId, sequence, timestamp, type, data FROM events \
     WHERE connectionId = ?1 ORDER BY sequence ASC LIMIT ?2";
const NEXT_EVENTS_PAGE: &str = "SELECT connectionId, sequence, timestamp, type, data FROM events \
     WHERE connectionId = ?1 AND sequence > ?2 ORDER BY sequence ASC LIMIT ?3";
const LAST_EVENT: &str = "SELECT connectionId, sequence, timestamp, type, data FROM events \
     WHERE connectionId = ?1 ORDER BY sequence DESC LIMIT 1";
const FIRST_IDS_PAGE: &str =
    "SELECT DISTINCT connectionId FROM events ORDER BY connectionId ASC LIMIT ?1";
const NEXT_IDS_PAGE: &str = "SELECT DISTINCT connectionId FROM events \
     WHERE connectionId > ?1 ORDER BY connectionId ASC LIMIT ?2";

/// Options for opening an archive
#[derive(Debug, Clone)]
pub struct ArchiveOpenOptions {
    /// How long a read waits for a writer's lock before failing with `Busy`
    pub busy_timeout: Duration,
    /// Rows fetched per page by the lazy streams
    pub page_size: usize,
}

impl Default for ArchiveOpenOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ArchiveOpenOptions {
    /// Set the busy timeout
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the page size (clamped to at least 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Read-only snapshot of a SQLite connection archive
pub struct SqliteEventStore {
    conn: Connection,
    path: PathBuf,
    page_size: usize,
}

impl SqliteEventStore {
    /// Open an archive file read-only and begin its snapshot transaction
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if `path` is not an existing file,
    /// or a database error if SQLite refuses to open it.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, options: ArchiveOpenOptions) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StorageError::not_found(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch("BEGIN DEFERRED")?;

        info!(
            busy_timeout_ms = options.busy_timeout.as_millis() as u64,
            page_size = options.page_size,
            "Opened archive read-only"
        );

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            page_size: options.page_size.max(1),
        })
    }

    /// Path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows fetched per page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn fetch_events(
        &self,
        connection_id: i64,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let limit = sql_limit(limit);
        let mut stmt = match after {
            None => self.conn.prepare_cached(FIRST_EVENTS_PAGE)?,
            Some(_) => self.conn.prepare_cached(NEXT_EVENTS_PAGE)?,
        };
        let rows = match after {
            None => stmt.query_map(params![connection_id, limit], event_from_row)?,
            Some(sequence) => {
                stmt.query_map(params![connection_id, sequence, limit], event_from_row)?
            }
        };
        let page = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(connection_id, after = ?after, rows = page.len(), "Fetched event page");
        Ok(page)
    }

    fn fetch_connection_ids(
        &self,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ConnectionId>, StorageError> {
        let limit = sql_limit(limit);
        let mut stmt = match after {
            None => self.conn.prepare_cached(FIRST_IDS_PAGE)?,
            Some(_) => self.conn.prepare_cached(NEXT_IDS_PAGE)?,
        };
        let rows = match after {
            None => stmt.query_map(params![limit], first_column)?,
            Some(id) => stmt.query_map(params![id, limit], first_column)?,
        };
        let ids = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(ConnectionId).collect())
    }
}

impl Drop for SqliteEventStore {
    fn drop(&mut self) {
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            warn!(error = %e, "Failed to end archive read transaction");
        }
    }
}

impl EventStore for SqliteEventStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn structural_check(&self) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare("PRAGMA integrity_check")?;
        let report = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        if report.len() == 1 && report[0] == "ok" {
            debug!("SQLite integrity check passed");
            Ok(())
        } else {
            warn!(problems = report.len(), "SQLite integrity check failed");
            Err(StorageError::corrupt(report.join("; ")))
        }
    }

    fn total_event_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn connection_id_range(&self) -> Result<Option<(ConnectionId, ConnectionId)>, StorageError> {
        let (min, max): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT min(connectionId), max(connectionId) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(min
            .zip(max)
            .map(|(min, max)| (ConnectionId(min), ConnectionId(max))))
    }

    fn connection_ids(&self) -> ConnectionIdStream<'_> {
        Box::new(KeysetPages::new(
            self.page_size,
            |id: &ConnectionId| id.value(),
            move |after, limit| self.fetch_connection_ids(after, limit),
        ))
    }

    fn events_for(&self, connection_id: ConnectionId) -> EventStream<'_> {
        let id = connection_id.value();
        Box::new(KeysetPages::new(
            self.page_size,
            |event: &Event| event.sequence,
            move |after, limit| self.fetch_events(id, after, limit),
        ))
    }

    fn last_event(&self, connection_id: ConnectionId) -> Result<Option<Event>, StorageError> {
        let mut stmt = self.conn.prepare_cached(LAST_EVENT)?;
        Ok(stmt
            .query_row(params![connection_id.value()], event_from_row)
            .optional()?)
    }
}

/// `LIMIT` value for a page size; SQLite treats negative limits as unbounded
fn sql_limit(page_size: usize) -> i64 {
    i64::try_from(page_size).unwrap_or(i64::MAX)
}

fn first_column(row: &Row<'_>) -> rusqlite::Result<i64> {
    row.get(0)
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    let payload = match row.get_ref(4)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Bytes::copy_from_slice(bytes),
        ValueRef::Null => Bytes::new(),
        ValueRef::Integer(i) => Bytes::from(i.to_string()),
        ValueRef::Real(f) => Bytes::from(f.to_string()),
    };
    // Column affinity keeps non-numeric text as text
    let type_code = match row.get_ref(3)? {
        ValueRef::Integer(code) => code,
        other => {
            warn!(value_type = %other.data_type(), "Non-integer event type");
            NON_INTEGER_TYPE_CODE
        }
    };
    Ok(Event::with_type_code(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        type_code,
        payload,
    ))
}
