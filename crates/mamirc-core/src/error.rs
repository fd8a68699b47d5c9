//! Error types for mamirc-core

use thiserror::Error;

/// Errors produced while decoding an event payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The payload of a connection event is not valid UTF-8
    #[error("payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_utf8_message() {
        let err = PayloadError::InvalidUtf8 { valid_up_to: 3 };
        assert!(err.to_string().contains("byte 3"));
    }
}
