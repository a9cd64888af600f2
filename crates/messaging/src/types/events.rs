//! Wire event schema for the persistent connection.
//!
//! Events are internally tagged JSON objects; the tag and all field names are
//! camelCase on the wire.

use lynk_database::{ChatMessage, MessageKind};
use serde::{Deserialize, Serialize};

use super::errors::RejectReason;

/// Events received from a client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind the connection and register room membership in one step. The
    /// identity field is optional wire compatibility: when present it must
    /// match the identity derived from the session credential.
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        identity: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        /// Optional claimed sender. Checked against the bound identity,
        /// never used as the source of truth.
        #[serde(default)]
        from_user: Option<String>,
        to_user: String,
        #[serde(default)]
        kind: MessageKind,
        #[serde(default)]
        body: String,
        #[serde(default)]
        attachment_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Typing { from: String, to: String },
    #[serde(rename_all = "camelCase")]
    StopTyping { from: String, to: String },
}

/// Events pushed to client connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A persisted message, fanned out to both participants' rooms.
    #[serde(rename_all = "camelCase")]
    ReceiveMessage { message: WireMessage },
    /// Fan-out acknowledgment, addressed to the sender's room only.
    #[serde(rename_all = "camelCase")]
    MessageDelivered { message_id: String },
    #[serde(rename_all = "camelCase")]
    Typing { from: String, to: String },
    #[serde(rename_all = "camelCase")]
    StopTyping { from: String, to: String },
    /// Non-fatal rejection of a send, addressed to the issuing connection.
    #[serde(rename_all = "camelCase")]
    SendRejected { reason: RejectReason, detail: String },
    /// Fatal protocol error; the server closes the connection after this.
    #[serde(rename_all = "camelCase")]
    Error { reason: RejectReason, detail: String },
}

/// Wire form of a persisted message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub id: String,
    pub from_user: String,
    pub to_user: String,
    pub kind: MessageKind,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub created_at: String,
}

impl From<ChatMessage> for WireMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.public_id,
            from_user: message.from_user,
            to_user: message.to_user,
            kind: message.kind,
            body: message.body,
            attachment_url: message.attachment_url,
            created_at: message.created_at,
        }
    }
}
