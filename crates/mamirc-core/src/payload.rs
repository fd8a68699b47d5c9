//! Connection event payloads
//!
//! A connection-type event carries one of four space-separated text commands
//! written by the connector:
//!
//! ```text
//! connect <host> <port> <ssl|nossl> <profile name>
//! opened <address>
//! disconnect
//! closed
//! ```
//!
//! Anything else decodes to [`ConnectionPayload::Malformed`].

use std::fmt;

use crate::error::PayloadError;

/// Number of fields in a well-formed `connect` payload
pub const CONNECT_FIELD_COUNT: usize = 5;

/// Decoded payload of a connection-type event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPayload {
    /// A connection attempt to an IRC server was started
    Connect {
        server_host: String,
        server_port: String,
        tls_mode: String,
        /// Network profile name; may itself contain spaces
        profile_name: String,
    },
    /// The socket to the server was opened
    Opened {
        /// Usually the resolved server address
        detail: String,
    },
    /// A disconnect was requested
    Disconnect,
    /// The socket was closed; no further events may follow
    Closed,
    /// Text that matches none of the known shapes
    Malformed(String),
}

impl ConnectionPayload {
    /// Decode raw payload bytes
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::InvalidUtf8`] if the bytes are not UTF-8.
    pub fn parse(raw: &[u8]) -> Result<Self, PayloadError> {
        let text = std::str::from_utf8(raw).map_err(|e| PayloadError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })?;
        Ok(Self::parse_text(text))
    }

    /// Decode already-validated payload text
    pub fn parse_text(text: &str) -> Self {
        if text.starts_with("connect") {
            let fields: Vec<&str> = text.splitn(CONNECT_FIELD_COUNT, ' ').collect();
            return match fields.as_slice() {
                [_, host, port, tls, profile] => Self::Connect {
                    server_host: (*host).to_string(),
                    server_port: (*port).to_string(),
                    tls_mode: (*tls).to_string(),
                    profile_name: (*profile).to_string(),
                },
                _ => Self::Malformed(text.to_string()),
            };
        }

        let mut fields = text.splitn(2, ' ');
        match (fields.next(), fields.next()) {
            (Some("opened"), Some(detail)) => Self::Opened {
                detail: detail.to_string(),
            },
            (Some("disconnect"), None) => Self::Disconnect,
            (Some("closed"), None) => Self::Closed,
            _ => Self::Malformed(text.to_string()),
        }
    }

    /// Short name of the payload kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Opened { .. } => "opened",
            Self::Disconnect => "disconnect",
            Self::Closed => "closed",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Whether this payload is a well-formed command
    pub fn is_well_formed(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }

    /// Server port of a `connect` payload, if it is a valid port number
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Connect { server_port, .. } => server_port.parse().ok(),
            _ => None,
        }
    }

    /// TLS flag of a `connect` payload (`ssl` / `nossl`)
    pub fn uses_tls(&self) -> Option<bool> {
        match self {
            Self::Connect { tls_mode, .. } => match tls_mode.as_str() {
                "ssl" => Some(true),
                "nossl" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect {
                server_host,
                server_port,
                tls_mode,
                profile_name,
            } => write!(
                f,
                "connect {} {} {} {}",
                server_host, server_port, tls_mode, profile_name
            ),
            Self::Opened { detail } => write!(f, "opened {}", detail),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Closed => write!(f, "closed"),
            Self::Malformed(text) => write!(f, "{:?}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connect() {
        let payload = ConnectionPayload::parse(b"connect irc.libera.chat 6697 ssl Libera Chat").unwrap();
        assert_eq!(
            payload,
            ConnectionPayload::Connect {
                server_host: "irc.libera.chat".into(),
                server_port: "6697".into(),
                tls_mode: "ssl".into(),
                profile_name: "Libera Chat".into(),
            }
        );
        assert_eq!(payload.port(), Some(6697));
        assert_eq!(payload.uses_tls(), Some(true));
    }

    #[test]
    fn test_connect_field_count() {
        assert!(matches!(
            ConnectionPayload::parse_text("connect irc.example.org 6667 nossl"),
            ConnectionPayload::Malformed(_)
        ));
        assert!(matches!(
            ConnectionPayload::parse_text("connect"),
            ConnectionPayload::Malformed(_)
        ));
    }

    #[test]
    fn test_connect_is_a_prefix_match() {
        let payload = ConnectionPayload::parse_text("connectx h 1 ssl p");
        assert_eq!(payload.kind(), "connect");
    }

    #[test]
    fn test_connect_with_odd_fields_is_still_well_formed() {
        let payload = ConnectionPayload::parse_text("connect host notaport tls profile");
        assert!(payload.is_well_formed());
        assert_eq!(payload.port(), None);
        assert_eq!(payload.uses_tls(), None);
    }

    #[test]
    fn test_parse_opened() {
        assert_eq!(
            ConnectionPayload::parse_text("opened 192.0.2.7"),
            ConnectionPayload::Opened {
                detail: "192.0.2.7".into()
            }
        );
        assert!(!ConnectionPayload::parse_text("opened").is_well_formed());
    }

    #[test]
    fn test_parse_single_word_commands() {
        assert_eq!(
            ConnectionPayload::parse_text("disconnect"),
            ConnectionPayload::Disconnect
        );
        assert_eq!(ConnectionPayload::parse_text("closed"), ConnectionPayload::Closed);
        assert!(!ConnectionPayload::parse_text("closed now").is_well_formed());
        assert!(!ConnectionPayload::parse_text("disconnect please").is_well_formed());
    }

    #[test]
    fn test_unknown_commands_are_malformed() {
        for text in ["", "open 1.2.3.4", "CLOSED", " closed"] {
            assert!(
                !ConnectionPayload::parse_text(text).is_well_formed(),
                "{:?} should be malformed",
                text
            );
        }
    }

    #[test]
    fn test_invalid_utf8() {
        let err = ConnectionPayload::parse(b"closed\xff").unwrap_err();
        assert_eq!(err, PayloadError::InvalidUtf8 { valid_up_to: 6 });
    }
}
