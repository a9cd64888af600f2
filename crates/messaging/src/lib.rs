//! Lynk Messaging Core
//!
//! Real-time one-to-one messaging: connection lifecycle, room registry,
//! message routing with per-pair ordering, delivery acknowledgments, and
//! ephemeral presence signals. Transport-agnostic: connections hand inbound
//! events to this crate and receive outbound events on per-connection
//! channels; the WebSocket surface lives in the gateway.

pub mod connection;
pub mod delivery;
pub mod presence;
pub mod registry;
pub mod router;
pub mod store;
pub mod types;

pub use connection::{Connection, ConnectionId, ConnectionState};
pub use delivery::DeliveryTracker;
pub use presence::PresenceNotifier;
pub use registry::{OutboundSender, RoomRegistry};
pub use router::{MessageRouter, SendRequest};
pub use store::{MessageStore, SqliteMessageStore};
pub use types::{
    ClientEvent, MessagingError, MessagingResult, RejectReason, ServerEvent, WireMessage,
};
