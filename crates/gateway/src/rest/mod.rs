//! REST API endpoints for the gateway

pub mod auth;
pub mod health;
pub mod history;

use axum::{middleware as axum_middleware, routing::get, routing::post, Router};
use std::sync::Arc;

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// Create all REST API routes.
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let protected = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/chat/history/:peer_id", get(history::conversation_history))
        .route_layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/dev/token", post(auth::dev_token))
        .merge(protected)
}
