//! In-memory event store
//!
//! Keeps events in the order an archive would return them. Used by tests
//! and by tools that assemble event logs without touching disk.

use mamirc_core::{ConnectionId, Event};

use crate::error::StorageError;
use crate::{ConnectionIdStream, EventStore, EventStream};

/// In-memory implementation of [`EventStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    /// Events ordered by (connection ID, sequence); ties keep insertion order
    events: Vec<Event>,
    /// Injected result of the structural check
    structural_failure: Option<String>,
    /// Connection whose event stream fails after its first event
    read_failure: Option<(ConnectionId, String)>,
}

impl InMemoryEventStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given events
    pub fn from_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut store = Self::new();
        store.extend(events);
        store
    }

    /// Add events, keeping archive read order
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
        self.events
            .sort_by_key(|event| (event.connection_id, event.sequence));
    }

    /// Make the structural check fail with the given engine message
    pub fn with_structural_failure(mut self, message: impl Into<String>) -> Self {
        self.structural_failure = Some(message.into());
        self
    }

    /// Make reads of one connection fail as if the busy timeout expired
    pub fn with_read_failure(mut self, connection_id: ConnectionId, message: impl Into<String>) -> Self {
        self.read_failure = Some((connection_id, message.into()));
        self
    }

    /// Number of events held
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventStore for InMemoryEventStore {
    fn structural_check(&self) -> Result<(), StorageError> {
        match &self.structural_failure {
            Some(message) => Err(StorageError::corrupt(message.clone())),
            None => Ok(()),
        }
    }

    fn total_event_count(&self) -> Result<u64, StorageError> {
        Ok(self.events.len() as u64)
    }

    fn connection_id_range(&self) -> Result<Option<(ConnectionId, ConnectionId)>, StorageError> {
        Ok(self
            .events
            .first()
            .zip(self.events.last())
            .map(|(first, last)| (first.connection_id, last.connection_id)))
    }

    fn connection_ids(&self) -> ConnectionIdStream<'_> {
        let mut previous = None;
        Box::new(self.events.iter().filter_map(move |event| {
            if previous == Some(event.connection_id) {
                None
            } else {
                previous = Some(event.connection_id);
                Some(Ok(event.connection_id))
            }
        }))
    }

    fn events_for(&self, connection_id: ConnectionId) -> EventStream<'_> {
        let events = self
            .events
            .iter()
            .filter(move |event| event.connection_id == connection_id)
            .cloned()
            .map(Ok);

        match &self.read_failure {
            Some((failing, message)) if *failing == connection_id => Box::new(
                events
                    .take(1)
                    .chain(std::iter::once(Err(StorageError::busy(message.clone())))),
            ),
            _ => Box::new(events),
        }
    }

    fn last_event(&self, connection_id: ConnectionId) -> Result<Option<Event>, StorageError> {
        match &self.read_failure {
            Some((failing, message)) if *failing == connection_id => {
                return Err(StorageError::busy(message.clone()));
            }
            _ => {}
        }
        Ok(self
            .events
            .iter()
            .rev()
            .find(|event| event.connection_id == connection_id)
            .cloned())
    }
}
