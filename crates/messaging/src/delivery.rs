//! Delivery acknowledgments.
//!
//! Confirms "handed to the transport after durable persistence", not "read".

use tracing::debug;

use crate::registry::RoomRegistry;
use crate::types::ServerEvent;

pub struct DeliveryTracker {
    registry: RoomRegistry,
}

impl DeliveryTracker {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    /// Push a `messageDelivered` acknowledgment to the sender's room.
    /// Returns the number of sender connections reached.
    pub async fn acknowledge(&self, sender: &str, message_id: &str) -> usize {
        let event = ServerEvent::MessageDelivered {
            message_id: message_id.to_string(),
        };
        let delivered = self.registry.send_to_room(sender, &event).await;

        debug!(
            message_id = %message_id,
            sender = %sender,
            connections = delivered,
            "delivery acknowledged"
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionId;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn acknowledgment_reaches_every_sender_connection() {
        let registry = RoomRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.join("u1", ConnectionId::new(), tx_a).await;
        registry.join("u1", ConnectionId::new(), tx_b).await;

        let tracker = DeliveryTracker::new(registry);
        let reached = tracker.acknowledge("u1", "m1").await;

        assert_eq!(reached, 2);
        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                rx.try_recv().unwrap(),
                ServerEvent::MessageDelivered {
                    message_id: "m1".to_string()
                }
            );
        }
    }

    #[tokio::test]
    async fn acknowledgment_with_no_sender_connections_is_harmless() {
        let tracker = DeliveryTracker::new(RoomRegistry::new());
        assert_eq!(tracker.acknowledge("u1", "m1").await, 0);
    }
}
