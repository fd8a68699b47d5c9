//! Per-connection replay through the lifecycle state machine
//!
//! A [`ConnectionValidator`] consumes one connection's events in ascending
//! sequence order and streams what it finds to a [`DiagnosticSink`]. It keeps
//! only the current state and the next expected sequence number, so a
//! connection of any length is checked in constant memory.

use mamirc_core::{ConnectionId, ConnectionPayload, Event, EventType};
use mamirc_storage::StorageError;
use tracing::debug;

use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::lifecycle::{LifecycleInput, LifecycleState, Transition};

/// Whether the caller should keep feeding events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The connection was aborted; remaining events are not checked
    Stop,
}

/// Summary of one validated connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOutcome {
    pub connection_id: ConnectionId,
    /// Whether any Error-level diagnostic was emitted
    pub has_error: bool,
    pub final_state: LifecycleState,
    pub events_checked: u64,
    /// Whether checking stopped at a bad first event
    pub aborted: bool,
}

/// Outcome plus the diagnostics, for callers that want them collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub outcome: ConnectionOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// How one event feeds the state machine
struct Classified {
    input: LifecycleInput,
    /// Human-readable name of the event, e.g. `opened` or `inbound`
    label: String,
    /// Payload-level problem found before the state machine runs
    problem: Option<Diagnostic>,
}

/// Replays one connection's events
#[derive(Debug)]
pub struct ConnectionValidator {
    connection_id: ConnectionId,
    state: LifecycleState,
    next_sequence: i64,
    has_error: bool,
    events_checked: u64,
    aborted: bool,
}

impl ConnectionValidator {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            state: LifecycleState::Init,
            next_sequence: 0,
            has_error: false,
            events_checked: 0,
            aborted: false,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Check one event
    ///
    /// The sequence check always runs first. Once the connection has been
    /// aborted every further call returns [`Flow::Stop`] without output.
    pub fn observe(&mut self, event: &Event, sink: &mut dyn DiagnosticSink) -> Flow {
        if self.aborted {
            return Flow::Stop;
        }
        self.events_checked += 1;
        let sequence = event.sequence;

        if sequence != self.next_sequence {
            let message = if sequence < self.next_sequence {
                format!(
                    "sequence gap: expected {}, found {} (repeated or out of order)",
                    self.next_sequence, sequence
                )
            } else {
                format!(
                    "sequence gap: expected {}, found {}",
                    self.next_sequence, sequence
                )
            };
            self.emit(
                sink,
                Diagnostic::error(DiagnosticKind::SequenceGap, message).at(self.connection_id, sequence),
            );
        }
        self.next_sequence = sequence.saturating_add(1);

        let Classified {
            input,
            label,
            problem,
        } = self.classify(event);

        match self.state.advance(input) {
            Transition::Abort => {
                let reason = match &problem {
                    Some(problem) => problem.message.clone(),
                    None => format!("found {label} event"),
                };
                self.emit(
                    sink,
                    Diagnostic::error(
                        DiagnosticKind::LifecycleViolation,
                        format!("first event is not a valid connect: {reason}; connection not checked further"),
                    )
                    .at(self.connection_id, sequence)
                    .fatal(),
                );
                self.aborted = true;
                debug!(connection_id = %self.connection_id, sequence, "Aborted connection");
                Flow::Stop
            }
            Transition::Advance(next) => {
                self.state = next;
                Flow::Continue
            }
            Transition::Violation => {
                if let Some(problem) = problem {
                    self.emit(sink, problem);
                }
                let message = match self.state {
                    LifecycleState::Closed => {
                        format!("{label} event after the connection was closed")
                    }
                    state => format!("{label} event not allowed in {state} state"),
                };
                self.emit(
                    sink,
                    Diagnostic::error(DiagnosticKind::LifecycleViolation, message)
                        .at(self.connection_id, sequence),
                );
                Flow::Continue
            }
        }
    }

    /// Finish checking and summarize
    pub fn finish(self) -> ConnectionOutcome {
        ConnectionOutcome {
            connection_id: self.connection_id,
            has_error: self.has_error,
            final_state: self.state,
            events_checked: self.events_checked,
            aborted: self.aborted,
        }
    }

    fn emit(&mut self, sink: &mut dyn DiagnosticSink, diagnostic: Diagnostic) {
        self.has_error |= diagnostic.is_error();
        sink.emit(diagnostic);
    }

    fn classify(&self, event: &Event) -> Classified {
        let at = |diagnostic: Diagnostic| diagnostic.at(self.connection_id, event.sequence);

        let Some(event_type) = event.event_type() else {
            return Classified {
                input: LifecycleInput::Invalid,
                label: format!("type {}", event.type_code),
                problem: Some(at(Diagnostic::error(
                    DiagnosticKind::UnexpectedEventType,
                    format!("unexpected event type {}", event.type_code),
                ))),
            };
        };

        let payload = match event_type {
            EventType::Inbound | EventType::Outbound => {
                return Classified {
                    input: LifecycleInput::Traffic,
                    label: event_type.to_string(),
                    problem: None,
                };
            }
            EventType::Connection => ConnectionPayload::parse(&event.payload),
        };

        let input = match &payload {
            Ok(ConnectionPayload::Connect { .. }) => LifecycleInput::Connect,
            Ok(ConnectionPayload::Opened { .. }) => LifecycleInput::Opened,
            Ok(ConnectionPayload::Disconnect) => LifecycleInput::Disconnect,
            Ok(ConnectionPayload::Closed) => LifecycleInput::Closed,
            Ok(ConnectionPayload::Malformed(_)) | Err(_) => LifecycleInput::Invalid,
        };

        match payload {
            Ok(ConnectionPayload::Malformed(text)) => Classified {
                input,
                label: "malformed connection".to_string(),
                problem: Some(at(Diagnostic::error(
                    DiagnosticKind::MalformedPayload,
                    format!("malformed connection payload {text:?}"),
                ))),
            },
            Ok(parsed) => Classified {
                input,
                label: parsed.kind().to_string(),
                problem: None,
            },
            Err(err) => Classified {
                input,
                label: "undecodable connection".to_string(),
                problem: Some(at(Diagnostic::error(
                    DiagnosticKind::Decode,
                    format!("connection {err}"),
                ))),
            },
        }
    }
}

/// Validate a stream of events read from a store
///
/// Stops pulling events as soon as the connection is aborted.
///
/// # Errors
///
/// Returns the first storage error from the stream; diagnostics emitted
/// before it have already reached `sink`.
pub fn validate<I>(
    connection_id: ConnectionId,
    events: I,
    sink: &mut dyn DiagnosticSink,
) -> Result<ConnectionOutcome, StorageError>
where
    I: IntoIterator<Item = Result<Event, StorageError>>,
{
    let mut validator = ConnectionValidator::new(connection_id);
    for event in events {
        if validator.observe(&event?, sink) == Flow::Stop {
            break;
        }
    }
    Ok(validator.finish())
}

/// Validate in-memory events, collecting the diagnostics
pub fn check(connection_id: ConnectionId, events: impl IntoIterator<Item = Event>) -> ConnectionReport {
    let mut diagnostics = Vec::new();
    let mut validator = ConnectionValidator::new(connection_id);
    for event in events {
        if validator.observe(&event, &mut diagnostics) == Flow::Stop {
            break;
        }
    }
    ConnectionReport {
        outcome: validator.finish(),
        diagnostics,
    }
}
