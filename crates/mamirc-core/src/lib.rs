//! # MamIRC Core
//!
//! Core types shared by the MamIRC archive tooling.
//!
//! The archive is an append-only log of connection events. Every logical IRC
//! connection gets a [`ConnectionId`], and each of its events carries a
//! per-connection sequence number starting at zero.
//!
//! ## Key Types
//!
//! - [`Event`]: A single archived event, exactly as read from the store
//! - [`EventType`]: Connection lifecycle, inbound line, or outbound line
//! - [`ConnectionPayload`]: Decoded payload of a connection-type event

pub mod error;
pub mod event;
pub mod payload;

pub use error::PayloadError;
pub use event::{ConnectionId, Event, EventType};
pub use payload::ConnectionPayload;
