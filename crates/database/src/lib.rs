//! Lynk Database Crate
//!
//! Durable storage for the messaging backend: connection management,
//! embedded migrations, and the append-only message repository. Users and
//! sessions live in the same SQLite file but are written by `lynk-auth`.

use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::MessageRepository;

pub use entities::{ChatMessage, MessageKind, NewMessage};

pub use types::{errors::DatabaseError, DatabaseResult};

pub use lynk_config::DatabaseConfig;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
