//! Persistence writer interface and its SQLite adapter.
//!
//! The router talks to this trait only; the store is the single ordering
//! authority for a conversation. Messages are immutable once appended.

use async_trait::async_trait;
use lynk_database::{ChatMessage, DatabaseError, MessageRepository, NewMessage};
use sqlx::SqlitePool;

use crate::types::{MessagingError, MessagingResult};

#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably append a message, assigning its id and `created_at`.
    async fn append(&self, message: &NewMessage) -> MessagingResult<ChatMessage>;

    /// The full conversation between two identities, oldest first.
    async fn history_between(&self, user_a: &str, user_b: &str) -> MessagingResult<Vec<ChatMessage>>;
}

/// SQLite-backed store delegating to the message repository.
pub struct SqliteMessageStore {
    repository: MessageRepository,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repository: MessageRepository::new(pool),
        }
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, message: &NewMessage) -> MessagingResult<ChatMessage> {
        self.repository
            .create(message)
            .await
            .map_err(store_unavailable)
    }

    async fn history_between(&self, user_a: &str, user_b: &str) -> MessagingResult<Vec<ChatMessage>> {
        self.repository
            .history_between(user_a, user_b)
            .await
            .map_err(store_unavailable)
    }
}

fn store_unavailable(err: DatabaseError) -> MessagingError {
    MessagingError::PersistenceFailure(err.to_string())
}
