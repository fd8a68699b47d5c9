//! Concurrency tests for archive reads
//!
//! These tests verify that a reader sees one consistent snapshot while the
//! connector keeps appending, and that lock contention surfaces as an error
//! instead of missing data.

use std::time::{Duration, Instant};

use mamirc_core::{ConnectionId, Event, EventType};
use mamirc_storage::{ArchiveOpenOptions, ArchiveWriter, EventStore, SqliteEventStore, StorageError};
use tempfile::TempDir;

fn connection_events(connection_id: i64) -> Vec<Event> {
    vec![
        Event::connection(connection_id, 0, 1_000, "connect irc.example.org 6697 ssl Example"),
        Event::connection(connection_id, 1, 1_050, "opened 198.51.100.4"),
        Event::new(connection_id, 2, 1_100, EventType::Outbound, &b"NICK mamirc"[..]),
        Event::connection(connection_id, 3, 1_200, "closed"),
    ]
}

#[test]
fn test_reader_snapshot_ignores_concurrent_appends() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archive.sqlite");

    let mut writer = ArchiveWriter::create(&path).unwrap();
    writer.append_all(&connection_events(0)).unwrap();

    let store = SqliteEventStore::open(&path, ArchiveOpenOptions::default()).unwrap();
    assert_eq!(store.total_event_count().unwrap(), 4);

    // The connector keeps writing while the snapshot is held
    writer.append_all(&connection_events(1)).unwrap();
    writer
        .append(&Event::new(0, 4, 1_300, EventType::Inbound, &b"late"[..]))
        .unwrap();

    assert_eq!(store.total_event_count().unwrap(), 4);
    let ids: Vec<ConnectionId> = store.connection_ids().collect::<Result<_, _>>().unwrap();
    assert_eq!(ids, vec![ConnectionId(0)]);
    assert_eq!(store.events_for(ConnectionId(0)).count(), 4);

    // A fresh snapshot sees everything
    drop(store);
    let store = SqliteEventStore::open(&path, ArchiveOpenOptions::default()).unwrap();
    assert_eq!(store.total_event_count().unwrap(), 9);
    assert_eq!(store.connection_ids().count(), 2);
}

#[test]
fn test_reader_does_not_block_writer() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archive.sqlite");

    let mut writer = ArchiveWriter::create(&path).unwrap();
    writer.append_all(&connection_events(0)).unwrap();

    let store = SqliteEventStore::open(&path, ArchiveOpenOptions::default()).unwrap();
    let mut events = store.events_for(ConnectionId(0));
    assert!(events.next().unwrap().is_ok());

    // Mid-iteration, the writer still commits immediately
    let start = Instant::now();
    writer.append_all(&connection_events(7)).unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(events.count(), 3);
}

#[test]
fn test_exclusive_lock_surfaces_as_busy() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("archive.sqlite");

    // Rollback-journal database, so an exclusive writer really excludes readers
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE events(
            connectionId INTEGER NOT NULL,
            sequence INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            type INTEGER NOT NULL,
            data BLOB NOT NULL,
            PRIMARY KEY(connectionId, sequence)
        );
        INSERT INTO events VALUES(0, 0, 0, 0, CAST('closed' AS BLOB));
        BEGIN EXCLUSIVE;
        INSERT INTO events VALUES(0, 1, 0, 0, CAST('closed' AS BLOB));",
    )
    .unwrap();

    let options = ArchiveOpenOptions::default().with_busy_timeout(Duration::from_millis(50));
    let store = SqliteEventStore::open(&path, options).unwrap();
    let err = store.total_event_count().unwrap_err();
    assert!(matches!(err, StorageError::Busy(_)), "unexpected error: {err}");

    conn.execute_batch("COMMIT").unwrap();
}
