//! Typing and stop-typing signals.
//!
//! Ephemeral: never persisted, never acknowledged, delivered best-effort to
//! the recipient's room only. A late or duplicate stop-typing signal is
//! tolerated downstream.

use tracing::debug;

use crate::registry::RoomRegistry;
use crate::types::{MessagingError, MessagingResult, ServerEvent};

pub struct PresenceNotifier {
    registry: RoomRegistry,
}

impl PresenceNotifier {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    /// Forward a typing signal to `to`'s live connections.
    pub async fn typing(
        &self,
        bound_identity: &str,
        from: &str,
        to: &str,
    ) -> MessagingResult<usize> {
        self.forward(bound_identity, from, to, true).await
    }

    /// Forward a stop-typing signal to `to`'s live connections.
    pub async fn stop_typing(
        &self,
        bound_identity: &str,
        from: &str,
        to: &str,
    ) -> MessagingResult<usize> {
        self.forward(bound_identity, from, to, false).await
    }

    async fn forward(
        &self,
        bound_identity: &str,
        from: &str,
        to: &str,
        typing: bool,
    ) -> MessagingResult<usize> {
        validate(bound_identity, from, to)?;

        let event = if typing {
            ServerEvent::Typing {
                from: from.to_string(),
                to: to.to_string(),
            }
        } else {
            ServerEvent::StopTyping {
                from: from.to_string(),
                to: to.to_string(),
            }
        };

        let delivered = self.registry.send_to_room(to, &event).await;
        debug!(from = %from, to = %to, typing, connections = delivered, "presence signal forwarded");
        Ok(delivered)
    }
}

// Same identity checks as send: the signal's claimed sender must be the
// bound identity, and self-signaling is rejected.
fn validate(bound_identity: &str, from: &str, to: &str) -> MessagingResult<()> {
    if from != bound_identity {
        return Err(MessagingError::ProtocolViolation(format!(
            "claimed sender '{from}' does not match bound identity"
        )));
    }
    if from == to {
        return Err(MessagingError::ProtocolViolation(
            "presence signal addressed to its own sender".to_string(),
        ));
    }
    Ok(())
}
