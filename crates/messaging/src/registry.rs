//! Room registry: identity -> live connections.
//!
//! The only mutable shared structure in the core. One lock guards both the
//! forward map (identity to connections) and the reverse index (connection to
//! identity), so membership can never be observed half-updated. Outbound
//! traffic goes through per-connection unbounded channels; a send to a
//! connection that died a moment ago is a logged delivery miss, not an error.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::connection::ConnectionId;
use crate::types::ServerEvent;

pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
struct RegistryInner {
    rooms: HashMap<String, HashMap<ConnectionId, OutboundSender>>,
    identities: HashMap<ConnectionId, String>,
}

#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection in its identity's room. Idempotent; a second
    /// join for the same connection replaces its sender. A connection is a
    /// member of at most one room, so joining under a new identity removes
    /// it from the old room first.
    pub async fn join(&self, identity: &str, connection_id: ConnectionId, sender: OutboundSender) {
        let mut inner = self.inner.write().await;

        if let Some(previous) = inner.identities.get(&connection_id).cloned() {
            if previous != identity {
                remove_from_room(&mut inner, &previous, connection_id);
            }
        }

        inner
            .rooms
            .entry(identity.to_string())
            .or_default()
            .insert(connection_id, sender);
        inner
            .identities
            .insert(connection_id, identity.to_string());

        debug!(identity = %identity, connection = %connection_id, "joined room");
    }

    /// Remove a connection from whatever room it belongs to. No-op when the
    /// connection was never registered. Returns the identity it was bound to.
    pub async fn leave(&self, connection_id: ConnectionId) -> Option<String> {
        let mut inner = self.inner.write().await;

        let identity = inner.identities.remove(&connection_id)?;
        remove_from_room(&mut inner, &identity, connection_id);

        debug!(identity = %identity, connection = %connection_id, "left room");
        Some(identity)
    }

    /// Snapshot of the current members of an identity's room. Never blocks
    /// on anything but the registry lock itself.
    pub async fn members_of(&self, identity: &str) -> Vec<(ConnectionId, OutboundSender)> {
        let inner = self.inner.read().await;
        inner
            .rooms
            .get(identity)
            .map(|room| {
                room.iter()
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Push an event to every live connection in an identity's room.
    /// Best-effort: a closed channel is a delivery miss, not a failure.
    /// Returns the number of connections the event was handed to.
    pub async fn send_to_room(&self, identity: &str, event: &ServerEvent) -> usize {
        let members = self.members_of(identity).await;
        let mut delivered = 0;

        for (connection_id, sender) in members {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(
                    identity = %identity,
                    connection = %connection_id,
                    "delivery miss on dead connection"
                );
            }
        }

        delivered
    }

    /// Number of live connections for an identity.
    pub async fn connection_count(&self, identity: &str) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(identity).map_or(0, HashMap::len)
    }
}

fn remove_from_room(inner: &mut RegistryInner, identity: &str, connection_id: ConnectionId) {
    if let Some(room) = inner.rooms.get_mut(identity) {
        room.remove(&connection_id);
        if room.is_empty() {
            inner.rooms.remove(identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RejectReason;

    fn channel() -> (OutboundSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    fn probe_event() -> ServerEvent {
        ServerEvent::SendRejected {
            reason: RejectReason::ValidationFailure,
            detail: "probe".to_string(),
        }
    }

    #[tokio::test]
    async fn join_registers_connection_in_room() {
        let registry = RoomRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = channel();

        registry.join("u1", id, tx).await;

        assert_eq!(registry.connection_count("u1").await, 1);
        assert_eq!(registry.members_of("u1").await[0].0, id);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = channel();

        registry.join("u1", id, tx.clone()).await;
        registry.join("u1", id, tx).await;

        assert_eq!(registry.connection_count("u1").await, 1);
    }

    #[tokio::test]
    async fn multiple_devices_share_one_room() {
        let registry = RoomRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();

        registry.join("u1", ConnectionId::new(), tx_a).await;
        registry.join("u1", ConnectionId::new(), tx_b).await;

        let delivered = registry.send_to_room("u1", &probe_event()).await;
        assert_eq!(delivered, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_removes_only_the_leaving_connection() {
        let registry = RoomRegistry::new();
        let staying = ConnectionId::new();
        let leaving = ConnectionId::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        registry.join("u1", staying, tx_a).await;
        registry.join("u1", leaving, tx_b).await;

        assert_eq!(registry.leave(leaving).await.as_deref(), Some("u1"));
        assert_eq!(registry.connection_count("u1").await, 1);
        assert_eq!(registry.members_of("u1").await[0].0, staying);
    }

    #[tokio::test]
    async fn leave_unknown_connection_is_a_noop() {
        let registry = RoomRegistry::new();
        assert!(registry.leave(ConnectionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn members_of_unknown_identity_is_empty() {
        let registry = RoomRegistry::new();
        assert!(registry.members_of("ghost").await.is_empty());
    }

    #[tokio::test]
    async fn send_to_dead_connection_is_a_nonfatal_miss() {
        let registry = RoomRegistry::new();
        let (tx, rx) = channel();
        registry.join("u1", ConnectionId::new(), tx).await;
        drop(rx);

        let delivered = registry.send_to_room("u1", &probe_event()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn rejoining_under_new_identity_moves_rooms() {
        let registry = RoomRegistry::new();
        let id = ConnectionId::new();
        let (tx, _rx) = channel();

        registry.join("u1", id, tx.clone()).await;
        registry.join("u2", id, tx).await;

        assert_eq!(registry.connection_count("u1").await, 0);
        assert_eq!(registry.connection_count("u2").await, 1);
    }
}
