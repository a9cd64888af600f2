//! Message entity definitions

use serde::{Deserialize, Serialize};

/// A persisted one-to-one chat message. Immutable once written: the store
/// assigns `public_id` and `created_at`, and no update or delete exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub public_id: String,
    pub from_user: String,
    pub to_user: String,
    pub kind: MessageKind,
    pub body: String,
    pub attachment_url: Option<String>,
    pub created_at: String,
}

/// Payload for appending a message. `from_user`/`to_user` are user public
/// ids; the caller is responsible for having validated them against the
/// sending connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub from_user: String,
    pub to_user: String,
    pub kind: MessageKind,
    pub body: String,
    pub attachment_url: Option<String>,
}

/// Message payload kind. `Text` carries `body`; everything else carries a
/// pre-uploaded `attachment_url`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, MessageKind::Text)
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "audio" => MessageKind::Audio,
            "document" => MessageKind::Document,
            _ => MessageKind::Text,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
