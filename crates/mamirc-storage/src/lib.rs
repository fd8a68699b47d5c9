//! # MamIRC Storage
//!
//! Storage access for MamIRC archive tooling.
//!
//! The connector appends every connection event to a SQLite archive. This
//! crate reads that archive without ever writing to it, behind the
//! [`EventStore`] trait so the checker can run against any backend.
//!
//! ## Features
//!
//! - **EventStore trait**: Structural check, statistics, and lazy per-connection event streams
//! - **SqliteEventStore**: Read-only snapshot of an archive file, paginated reads
//! - **InMemoryEventStore**: In-memory implementation for tests
//! - **ArchiveWriter**: Creates archives with the connector's schema (fixtures, tooling)
//! - **ConfigStore**: Key/value configuration database
//!
//! ## Example
//!
//! ```rust,ignore
//! use mamirc_storage::{ArchiveOpenOptions, EventStore, SqliteEventStore};
//!
//! let store = SqliteEventStore::open("MamircArchive.sqlite", ArchiveOpenOptions::default())?;
//! store.structural_check()?;
//!
//! for id in store.connection_ids() {
//!     let id = id?;
//!     for event in store.events_for(id) {
//!         println!("{}#{}", id, event?.sequence);
//!     }
//! }
//! ```

pub mod config_store;
pub mod error;
pub mod memory;
mod paging;
pub mod sqlite;
pub mod writer;

// Re-exports
pub use config_store::ConfigStore;
pub use error::StorageError;
pub use memory::InMemoryEventStore;
pub use sqlite::{ArchiveOpenOptions, SqliteEventStore};
pub use writer::ArchiveWriter;

use mamirc_core::{ConnectionId, Event};

/// Lazy, fallible stream of events in ascending sequence order
pub type EventStream<'a> = Box<dyn Iterator<Item = Result<Event, StorageError>> + 'a>;

/// Lazy, fallible stream of distinct connection IDs in ascending order
pub type ConnectionIdStream<'a> = Box<dyn Iterator<Item = Result<ConnectionId, StorageError>> + 'a>;

/// Read access to an ordered archive of connection events
///
/// All reads on one store observe the same snapshot of the archive, even if
/// an external writer keeps appending to it.
pub trait EventStore {
    /// Run the storage engine's own low-level consistency check
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupt`] if the engine reports damage.
    fn structural_check(&self) -> Result<(), StorageError>;

    /// Total number of events across all connections
    fn total_event_count(&self) -> Result<u64, StorageError>;

    /// Lowest and highest connection ID present, or `None` if the archive is empty
    fn connection_id_range(&self) -> Result<Option<(ConnectionId, ConnectionId)>, StorageError>;

    /// Distinct connection IDs in ascending order
    ///
    /// IDs may have gaps and, in a damaged archive, may be negative.
    fn connection_ids(&self) -> ConnectionIdStream<'_>;

    /// Events of one connection in ascending sequence order
    ///
    /// Implementations must keep memory use bounded regardless of how many
    /// events the connection has.
    fn events_for(&self, connection_id: ConnectionId) -> EventStream<'_>;

    /// Event with the highest sequence number in one connection
    ///
    /// Returns `None` if the connection has no events.
    fn last_event(&self, connection_id: ConnectionId) -> Result<Option<Event>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the EventStore trait is object-safe
    fn _assert_object_safe(_: &dyn EventStore) {}

    #[test]
    fn test_trait_objects_stream_events() {
        let store = InMemoryEventStore::from_events([
            Event::connection(3, 0, 10, "connect h 6667 nossl p"),
            Event::connection(3, 1, 20, "closed"),
        ]);
        let store: &dyn EventStore = &store;

        let ids: Vec<_> = store.connection_ids().collect::<Result<_, _>>().unwrap();
        assert_eq!(ids, vec![ConnectionId(3)]);

        let sequences: Vec<i64> = store
            .events_for(ConnectionId(3))
            .map(|e| e.unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1]);

        let last = store.last_event(ConnectionId(3)).unwrap().unwrap();
        assert_eq!(last.sequence, 1);
        assert!(store.last_event(ConnectionId(4)).unwrap().is_none());
    }
}
