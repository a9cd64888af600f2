//! Shared application state for the gateway

use std::sync::Arc;

use lynk_auth::Authenticator;
use lynk_config::AppConfig;
use lynk_database::initialize_database;
use lynk_messaging::{
    MessageRouter, MessageStore, PresenceNotifier, RoomRegistry, SqliteMessageStore,
};
use sqlx::SqlitePool;

use crate::error::{GatewayError, GatewayResult};

/// Shared application state wiring the messaging core to the transport.
#[derive(Clone)]
pub struct GatewayState {
    /// Database connection pool
    pub pool: SqlitePool,
    /// Session and user management
    pub authenticator: Authenticator,
    /// Live connections per identity
    pub registry: RoomRegistry,
    /// Validate, persist, fan out
    pub router: Arc<MessageRouter>,
    /// Typing and stop-typing signals
    pub presence: Arc<PresenceNotifier>,
    /// Durable message store, shared with the router
    pub store: Arc<dyn MessageStore>,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, config: &AppConfig) -> Self {
        let authenticator = Authenticator::new(pool.clone(), config.auth.clone());
        let registry = RoomRegistry::new();
        let store: Arc<dyn MessageStore> = Arc::new(SqliteMessageStore::new(pool.clone()));
        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            store.clone(),
            &config.messaging,
        ));
        let presence = Arc::new(PresenceNotifier::new(registry.clone()));

        Self {
            pool,
            authenticator,
            registry,
            router,
            presence,
            store,
        }
    }

    /// Initialize the database and build the state from configuration.
    pub async fn from_config(config: &AppConfig) -> GatewayResult<Self> {
        let pool = initialize_database(&config.database)
            .await
            .map_err(|e| GatewayError::DatabaseError(format!("Failed to initialize database: {e}")))?;

        Ok(Self::new(pool, config))
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}
