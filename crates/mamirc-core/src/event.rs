//! Archived connection events

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use derive_more::Display;

use crate::error::PayloadError;
use crate::payload::ConnectionPayload;

/// Identifier of one logical IRC connection in the archive
///
/// Stored as a signed integer because the archive column is a plain SQL
/// integer; a negative value is representable and is itself a corruption.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("{_0}")]
pub struct ConnectionId(pub i64);

impl ConnectionId {
    /// Get the raw integer value
    pub fn value(self) -> i64 {
        self.0
    }

    /// Whether this ID lies in the valid (non-negative) range
    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl From<i64> for ConnectionId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Kind of an archived event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Connection lifecycle event (connect, opened, disconnect, closed)
    Connection,
    /// Line received from the IRC server
    Inbound,
    /// Line sent to the IRC server
    Outbound,
}

impl EventType {
    /// Decode the integer stored in the archive's `type` column
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Connection),
            1 => Some(Self::Inbound),
            2 => Some(Self::Outbound),
            _ => None,
        }
    }

    /// The integer stored in the archive's `type` column
    pub fn code(self) -> i64 {
        match self {
            Self::Connection => 0,
            Self::Inbound => 1,
            Self::Outbound => 2,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// A single event, exactly as read from the archive
///
/// The type is kept as its raw integer code so that out-of-range values
/// survive reading and can be reported by the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Connection this event belongs to
    pub connection_id: ConnectionId,
    /// Position of this event within its connection's log
    pub sequence: i64,
    /// Milliseconds since the Unix epoch
    pub timestamp_millis: i64,
    /// Raw value of the `type` column
    pub type_code: i64,
    /// Raw payload bytes (UTF-8 text for connection events)
    pub payload: Bytes,
}

impl Event {
    /// Create an event with a known type
    pub fn new(
        connection_id: i64,
        sequence: i64,
        timestamp_millis: i64,
        event_type: EventType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::with_type_code(
            connection_id,
            sequence,
            timestamp_millis,
            event_type.code(),
            payload,
        )
    }

    /// Create an event from a raw type code, which may be out of range
    pub fn with_type_code(
        connection_id: i64,
        sequence: i64,
        timestamp_millis: i64,
        type_code: i64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            connection_id: ConnectionId(connection_id),
            sequence,
            timestamp_millis,
            type_code,
            payload: payload.into(),
        }
    }

    /// Create a connection-type event with a text payload
    pub fn connection(
        connection_id: i64,
        sequence: i64,
        timestamp_millis: i64,
        text: &str,
    ) -> Self {
        Self::new(
            connection_id,
            sequence,
            timestamp_millis,
            EventType::Connection,
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    /// The decoded event type, or `None` if the code is out of range
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_code(self.type_code)
    }

    /// The timestamp as a UTC date-time, if representable
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }

    /// Decode the payload of a connection-type event
    ///
    /// Returns `None` for inbound/outbound events (and unknown types), which
    /// carry no structured payload.
    pub fn connection_payload(&self) -> Option<Result<ConnectionPayload, PayloadError>> {
        match self.event_type() {
            Some(EventType::Connection) => Some(ConnectionPayload::parse(&self.payload)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_codes() {
        for ty in [EventType::Connection, EventType::Inbound, EventType::Outbound] {
            assert_eq!(EventType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(EventType::from_code(3), None);
        assert_eq!(EventType::from_code(-1), None);
    }

    #[test]
    fn test_connection_id_validity() {
        assert!(ConnectionId(0).is_valid());
        assert!(!ConnectionId(-5).is_valid());
        assert_eq!(ConnectionId(42).to_string(), "42");
    }

    #[test]
    fn test_connection_payload_only_for_connection_events() {
        let inbound = Event::new(1, 3, 0, EventType::Inbound, &b"PING :x"[..]);
        assert!(inbound.connection_payload().is_none());

        let unknown = Event::with_type_code(1, 3, 0, 9, &b"closed"[..]);
        assert!(unknown.connection_payload().is_none());

        let closed = Event::connection(1, 4, 0, "closed");
        assert_eq!(
            closed.connection_payload(),
            Some(Ok(ConnectionPayload::Closed))
        );
    }

    #[test]
    fn test_timestamp_conversion() {
        let event = Event::connection(0, 0, 1_000, "closed");
        let ts = event.timestamp().unwrap();
        assert_eq!(ts.timestamp_millis(), 1_000);
    }
}
