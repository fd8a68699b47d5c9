//! Archive creation
//!
//! Creates archives with the same schema and journal mode the connector
//! uses, and appends events to them. The checker never writes; this exists
//! for fixtures, migrations and tests.

use std::path::Path;

use mamirc_core::Event;
use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, info};

use crate::error::StorageError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events(
    connectionId INTEGER NOT NULL,
    sequence INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    type INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY(connectionId, sequence)
);
CREATE TABLE IF NOT EXISTS unfinished_connections(
    connectionId INTEGER NOT NULL PRIMARY KEY
);
";

const INSERT_EVENT: &str = "INSERT INTO events VALUES(?1, ?2, ?3, ?4, ?5)";

/// Writable handle on an archive file
pub struct ArchiveWriter {
    conn: Connection,
}

impl ArchiveWriter {
    /// Open or create an archive, switching it to WAL mode and creating the schema
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.display(), journal_mode = %mode, "Opened archive for writing");
        Ok(Self { conn })
    }

    /// Append a single event in its own transaction
    pub fn append(&self, event: &Event) -> Result<(), StorageError> {
        let mut stmt = self.conn.prepare_cached(INSERT_EVENT)?;
        stmt.execute(params![
            event.connection_id.value(),
            event.sequence,
            event.timestamp_millis,
            event.type_code,
            &event.payload[..],
        ])?;
        Ok(())
    }

    /// Append a batch of events atomically
    pub fn append_all<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_EVENT)?;
            for event in events {
                stmt.execute(params![
                    event.connection_id.value(),
                    event.sequence,
                    event.timestamp_millis,
                    event.type_code,
                    &event.payload[..],
                ])?;
                count += 1;
            }
        }
        tx.commit()?;

        debug!(count, "Appended events");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event_count(writer: &ArchiveWriter) -> i64 {
        writer
            .conn
            .query_row("SELECT count(*) FROM events", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_append_all_counts_rows() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = ArchiveWriter::create(temp_dir.path().join("a.sqlite")).unwrap();
        let events = [
            Event::connection(4, 0, 0, "connect h 6667 nossl p"),
            Event::connection(4, 1, 5, "closed"),
        ];

        assert_eq!(writer.append_all(&events).unwrap(), 2);
        assert_eq!(event_count(&writer), 2);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ArchiveWriter::create(temp_dir.path().join("a.sqlite")).unwrap();
        let event = Event::connection(0, 0, 0, "closed");

        writer.append(&event).unwrap();
        assert!(writer.append(&event).is_err());
    }

    #[test]
    fn test_failed_batch_is_rolled_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = ArchiveWriter::create(temp_dir.path().join("a.sqlite")).unwrap();
        let events = [
            Event::connection(0, 0, 0, "connect h 6667 nossl p"),
            Event::connection(0, 0, 0, "closed"),
        ];

        assert!(writer.append_all(&events).is_err());
        assert_eq!(event_count(&writer), 0);
    }
}
