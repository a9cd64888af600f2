//! Message router: validate, persist, fan out, acknowledge.
//!
//! The router never trusts a claimed sender; the bound identity of the
//! issuing connection is the only source of truth. Ordering is guaranteed
//! per conversation pair by holding the pair's lock across persist and
//! fan-out, so no observer can see message B before message A when A was
//! persisted first.

use std::collections::HashMap;
use std::sync::Arc;

use lynk_config::MessagingConfig;
use lynk_database::{ChatMessage, MessageKind, NewMessage};
use tokio::sync::Mutex;
use tracing::info;

use crate::delivery::DeliveryTracker;
use crate::registry::RoomRegistry;
use crate::store::MessageStore;
use crate::types::{MessagingError, MessagingResult, ServerEvent, WireMessage};

/// A validated-not-yet send request, decoded from the wire.
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Claimed sender, if the client supplied one. Must match the bound
    /// identity; the router rejects a mismatch rather than correcting it.
    pub from_user: Option<String>,
    pub to_user: String,
    pub kind: MessageKind,
    pub body: String,
    pub attachment_url: Option<String>,
}

pub struct MessageRouter {
    registry: RoomRegistry,
    store: Arc<dyn MessageStore>,
    delivery: DeliveryTracker,
    max_body_bytes: usize,
    // Pair locks live for the process lifetime; the set of active pairs is
    // bounded by the user population.
    pair_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MessageRouter {
    pub fn new(
        registry: RoomRegistry,
        store: Arc<dyn MessageStore>,
        config: &MessagingConfig,
    ) -> Self {
        let delivery = DeliveryTracker::new(registry.clone());

        Self {
            registry,
            store,
            delivery,
            max_body_bytes: config.max_body_bytes,
            pair_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Route one send from a joined connection bound to `sender_identity`.
    ///
    /// On success the persisted message has been fanned out to both
    /// participants' rooms and the delivery acknowledgment pushed to the
    /// sender's room. On failure nothing was persisted and nothing was
    /// fanned out.
    pub async fn send(
        &self,
        sender_identity: &str,
        request: SendRequest,
    ) -> MessagingResult<ChatMessage> {
        self.validate(sender_identity, &request)?;

        let new_message = NewMessage {
            from_user: sender_identity.to_string(),
            to_user: request.to_user.clone(),
            kind: request.kind,
            body: request.body,
            attachment_url: request.attachment_url,
        };

        let pair_lock = self.pair_lock(sender_identity, &request.to_user).await;
        let _ordering_guard = pair_lock.lock().await;

        let message = self.store.append(&new_message).await?;

        let event = ServerEvent::ReceiveMessage {
            message: WireMessage::from(message.clone()),
        };
        let to_recipient = self.registry.send_to_room(&message.to_user, &event).await;
        let to_sender = self.registry.send_to_room(&message.from_user, &event).await;

        info!(
            message_id = %message.public_id,
            from_user = %message.from_user,
            to_user = %message.to_user,
            recipient_connections = to_recipient,
            sender_connections = to_sender,
            "routed message"
        );

        // Acknowledged even when the recipient had zero live connections:
        // the message is durable and history replay covers it.
        self.delivery
            .acknowledge(&message.from_user, &message.public_id)
            .await;

        Ok(message)
    }

    fn validate(&self, sender_identity: &str, request: &SendRequest) -> MessagingResult<()> {
        if request.to_user == sender_identity {
            return Err(MessagingError::ProtocolViolation(
                "message addressed to its own sender".to_string(),
            ));
        }

        if let Some(claimed) = request.from_user.as_deref() {
            if claimed != sender_identity {
                return Err(MessagingError::ProtocolViolation(format!(
                    "claimed sender '{claimed}' does not match bound identity"
                )));
            }
        }

        if request.to_user.is_empty() {
            return Err(MessagingError::ValidationFailure(
                "toUser must not be empty".to_string(),
            ));
        }

        if request.body.len() > self.max_body_bytes {
            return Err(MessagingError::ValidationFailure(format!(
                "body exceeds {} bytes",
                self.max_body_bytes
            )));
        }

        match request.kind {
            MessageKind::Text => {
                if request.body.trim().is_empty() {
                    return Err(MessagingError::ValidationFailure(
                        "text message requires a non-empty body".to_string(),
                    ));
                }
            }
            _ => {
                let has_attachment = request
                    .attachment_url
                    .as_deref()
                    .is_some_and(|url| !url.trim().is_empty());
                if !has_attachment {
                    return Err(MessagingError::ValidationFailure(format!(
                        "{} message requires a non-empty attachmentUrl",
                        request.kind
                    )));
                }
            }
        }

        Ok(())
    }

    async fn pair_lock(&self, a: &str, b: &str) -> Arc<Mutex<()>> {
        let key = pair_key(a, b);
        let mut locks = self.pair_locks.lock().await;
        locks.entry(key).or_default().clone()
    }
}

/// Unordered conversation pair key: the same two identities always map to
/// the same lock regardless of direction.
fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}\u{1f}{b}")
    } else {
        format!("{b}\u{1f}{a}")
    }
}
