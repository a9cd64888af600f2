//! Repository for message data access operations.
//!
//! The message table is an append-only log per conversation pair; rows are
//! never updated or deleted once written.

use crate::entities::{ChatMessage, MessageKind, NewMessage};
use crate::types::DatabaseResult;
use once_cell::sync::Lazy;
use sqlx::{Row, SqlitePool};
use tracing::info;

static CUID: Lazy<cuid2::CuidConstructor> = Lazy::new(cuid2::CuidConstructor::new);

/// Repository for message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message. Assigns the public id and the `created_at`
    /// timestamp; `created_at` plus the rowid is the ordering key for the
    /// conversation.
    pub async fn create(&self, message: &NewMessage) -> DatabaseResult<ChatMessage> {
        let public_id = CUID.create_id();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, from_user, to_user, kind, body, attachment_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&message.from_user)
        .bind(&message.to_user)
        .bind(message.kind.as_str())
        .bind(&message.body)
        .bind(message.attachment_url.as_deref())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let message_id = result.last_insert_rowid();

        info!(
            message_id = message_id,
            public_id = %public_id,
            from_user = %message.from_user,
            to_user = %message.to_user,
            kind = %message.kind,
            "persisted message"
        );

        Ok(ChatMessage {
            id: message_id,
            public_id,
            from_user: message.from_user.clone(),
            to_user: message.to_user.clone(),
            kind: message.kind,
            body: message.body.clone(),
            attachment_url: message.attachment_url.clone(),
            created_at: now,
        })
    }

    /// Fetch the full conversation between two users, oldest first. The pair
    /// is unordered: messages in both directions are returned.
    pub async fn history_between(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> DatabaseResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, public_id, from_user, to_user, kind, body, attachment_url, created_at
             FROM messages
             WHERE (from_user = ? AND to_user = ?) OR (from_user = ? AND to_user = ?)
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_message).collect()
    }

    /// Look up a single message by public id.
    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<ChatMessage>> {
        let row = sqlx::query(
            "SELECT id, public_id, from_user, to_user, kind, body, attachment_url, created_at
             FROM messages WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_message).transpose()
    }
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> DatabaseResult<ChatMessage> {
    let kind_str: String = row.try_get("kind")?;

    Ok(ChatMessage {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        from_user: row.try_get("from_user")?,
        to_user: row.try_get("to_user")?,
        kind: MessageKind::from(kind_str.as_str()),
        body: row.try_get("body")?,
        attachment_url: row.try_get("attachment_url")?,
        created_at: row.try_get("created_at")?,
    })
}
