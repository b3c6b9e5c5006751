//! Bridge error types.

use thiserror::Error;

use autobridge_config::ConfigError;
use autobridge_registry::RegistryError;
use autobridge_workqueue::QueueError;

/// Bridge error types.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Payload is not a JSON object.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Object has no string `type`.
    #[error("Message has no type")]
    MissingType,

    /// `type` names no known request.
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// A required field is absent or not a string.
    #[error("{kind} requires a string field '{field}'")]
    MissingField { kind: String, field: &'static str },

    /// A field is present with the wrong shape.
    #[error("{kind} field '{field}' must be {expected}")]
    InvalidField {
        kind: String,
        field: &'static str,
        expected: &'static str,
    },

    /// No free port after every bind attempt.
    #[error("Could not bind a port after {attempts} attempts")]
    BindExhausted { attempts: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_display() {
        let err = BridgeError::UnknownType("fly".to_string());
        assert_eq!(err.to_string(), "Unknown message type: fly");
    }

    #[test]
    fn test_missing_field_display() {
        let err = BridgeError::MissingField {
            kind: "runCliCommand".to_string(),
            field: "command",
        };
        assert_eq!(err.to_string(), "runCliCommand requires a string field 'command'");
    }

    #[test]
    fn test_bind_exhausted_display() {
        let err = BridgeError::BindExhausted { attempts: 5 };
        assert!(err.to_string().contains("5 attempts"));
    }
}
