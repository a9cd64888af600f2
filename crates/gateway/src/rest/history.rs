//! Conversation history endpoint.
//!
//! Clients call this on reconnect or initial load to reconcile whatever the
//! live channel missed. Typing signals are never persisted, so they can
//! never appear here.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use lynk_database::ChatMessage;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::AuthenticatedUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMessage {
    pub id: String,
    pub from_user: String,
    pub to_user: String,
    pub kind: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    pub created_at: String,
}

impl From<ChatMessage> for HistoryMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.public_id,
            from_user: message.from_user,
            to_user: message.to_user,
            kind: message.kind.to_string(),
            body: message.body,
            attachment_url: message.attachment_url,
            created_at: message.created_at,
        }
    }
}

/// The full conversation between the caller and a peer, oldest first.
#[utoipa::path(
    get,
    path = "/api/chat/history/{peer_id}",
    tag = "Chat",
    params(
        ("peer_id" = String, Path, description = "Public id of the conversation peer")
    ),
    responses(
        (status = 200, description = "Conversation ordered by createdAt ascending", body = [HistoryMessage]),
        (status = 400, description = "Caller queried a conversation with itself"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn conversation_history(
    State(state): State<Arc<GatewayState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(peer_id): Path<String>,
) -> GatewayResult<Json<Vec<HistoryMessage>>> {
    if peer_id.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "peer id must not be empty".to_string(),
        ));
    }
    if peer_id == user.public_id {
        return Err(GatewayError::InvalidRequest(
            "cannot fetch a conversation with yourself".to_string(),
        ));
    }

    let messages = state
        .store
        .history_between(&user.public_id, &peer_id)
        .await?;

    Ok(Json(messages.into_iter().map(HistoryMessage::from).collect()))
}
