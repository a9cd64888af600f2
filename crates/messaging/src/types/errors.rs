//! Error taxonomy for the messaging core.
//!
//! Three failure classes with different blast radii: protocol violations
//! close the connection, validation and persistence failures are reported to
//! the issuing connection and the connection stays up. Failures are never
//! broadcast to other connections.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    /// Identity mismatch, rebind attempt, or self-addressed message.
    /// Connection-fatal.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Malformed payload or a field that does not match the message kind.
    /// The request is rejected, the connection survives.
    #[error("validation failure: {0}")]
    ValidationFailure(String),

    /// The durable store refused the write. No retry, the send fails fast
    /// back to the issuing connection.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl MessagingError {
    /// Whether the error must tear down the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }

    pub fn reason(&self) -> RejectReason {
        match self {
            Self::ProtocolViolation(_) => RejectReason::ProtocolViolation,
            Self::ValidationFailure(_) => RejectReason::ValidationFailure,
            Self::PersistenceFailure(_) => RejectReason::PersistenceFailure,
        }
    }

    /// The human-readable part, without the class prefix.
    pub fn detail(&self) -> &str {
        match self {
            Self::ProtocolViolation(detail)
            | Self::ValidationFailure(detail)
            | Self::PersistenceFailure(detail) => detail,
        }
    }
}

/// Wire-level reason code carried by `sendRejected` and `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    ProtocolViolation,
    ValidationFailure,
    PersistenceFailure,
}
