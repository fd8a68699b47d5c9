//! Connection lifecycle state machine
//!
//! ```text
//! Init --connect--> Connecting --opened--> Opened --closed--> Closed
//!                   |  ^    \                |  ^
//!                   +--+     +----closed-----|--|------------> Closed
//!                disconnect              disconnect, traffic
//! ```
//!
//! States only move forward. A violation leaves the state unchanged.

use std::fmt;

/// Phase of one logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Init,
    Connecting,
    Opened,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Connecting => write!(f, "connecting"),
            Self::Opened => write!(f, "opened"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// What an event means to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleInput {
    Connect,
    Opened,
    Disconnect,
    Closed,
    /// An inbound or outbound line
    Traffic,
    /// Unknown type, undecodable or malformed payload
    Invalid,
}

/// Result of feeding one input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to (or stay in) the given state
    Advance(LifecycleState),
    /// The input is not allowed here; the state is unchanged
    Violation,
    /// The connection did not start with a connect; stop checking it
    Abort,
}

impl LifecycleState {
    /// Apply one input
    pub fn advance(self, input: LifecycleInput) -> Transition {
        use LifecycleInput as In;
        use LifecycleState as State;

        match (self, input) {
            (State::Init, In::Connect) => Transition::Advance(State::Connecting),
            (State::Init, _) => Transition::Abort,

            (State::Connecting, In::Opened) => Transition::Advance(State::Opened),
            (State::Connecting, In::Disconnect) => Transition::Advance(State::Connecting),
            (State::Connecting, In::Closed) => Transition::Advance(State::Closed),
            (State::Connecting, _) => Transition::Violation,

            (State::Opened, In::Traffic | In::Disconnect) => Transition::Advance(State::Opened),
            (State::Opened, In::Closed) => Transition::Advance(State::Closed),
            (State::Opened, _) => Transition::Violation,

            (State::Closed, _) => Transition::Violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [LifecycleState; 4] = [
        LifecycleState::Init,
        LifecycleState::Connecting,
        LifecycleState::Opened,
        LifecycleState::Closed,
    ];

    const INPUTS: [LifecycleInput; 6] = [
        LifecycleInput::Connect,
        LifecycleInput::Opened,
        LifecycleInput::Disconnect,
        LifecycleInput::Closed,
        LifecycleInput::Traffic,
        LifecycleInput::Invalid,
    ];

    #[test]
    fn test_never_moves_backward() {
        for state in STATES {
            for input in INPUTS {
                if let Transition::Advance(next) = state.advance(input) {
                    assert!(next >= state, "{state} --{input:?}--> {next}");
                }
            }
        }
    }

    #[test]
    fn test_only_init_aborts() {
        for state in STATES {
            for input in INPUTS {
                let aborts = state.advance(input) == Transition::Abort;
                assert_eq!(
                    aborts,
                    state == LifecycleState::Init && input != LifecycleInput::Connect
                );
            }
        }
    }

    #[test]
    fn test_closed_rejects_everything() {
        for input in INPUTS {
            assert_eq!(LifecycleState::Closed.advance(input), Transition::Violation);
        }
    }

    #[test]
    fn test_normal_lifecycle() {
        let mut state = LifecycleState::Init;
        for input in [
            LifecycleInput::Connect,
            LifecycleInput::Disconnect,
            LifecycleInput::Opened,
            LifecycleInput::Traffic,
            LifecycleInput::Disconnect,
            LifecycleInput::Traffic,
            LifecycleInput::Closed,
        ] {
            match state.advance(input) {
                Transition::Advance(next) => state = next,
                other => panic!("{input:?} in {state}: {other:?}"),
            }
        }
        assert_eq!(state, LifecycleState::Closed);
    }

    #[test]
    fn test_traffic_before_opened_is_a_violation() {
        assert_eq!(
            LifecycleState::Connecting.advance(LifecycleInput::Traffic),
            Transition::Violation
        );
        assert_eq!(
            LifecycleState::Opened.advance(LifecycleInput::Connect),
            Transition::Violation
        );
        assert_eq!(
            LifecycleState::Opened.advance(LifecycleInput::Invalid),
            Transition::Violation
        );
    }
}
