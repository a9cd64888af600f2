//! # Lynk Gateway Crate
//!
//! HTTP and WebSocket surface for the messaging backend. REST endpoints
//! cover health, dev token issuance, and conversation history; the
//! WebSocket endpoint drives the messaging core.

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use state::GatewayState;

use axum::{http::Method, middleware as axum_middleware, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(rest::create_rest_routes(arc_state.clone()))
        .merge(websocket::create_websocket_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    #[cfg(debug_assertions)]
    {
        #[derive(OpenApi)]
        #[openapi(
            paths(
                rest::health::health_check,
                rest::auth::dev_token,
                rest::auth::me,
                rest::history::conversation_history,
            ),
            components(
                schemas(
                    rest::health::HealthResponse,
                    rest::auth::DevTokenRequest,
                    rest::auth::SessionResponse,
                    rest::auth::UserResponse,
                    rest::auth::ErrorResponse,
                    rest::history::HistoryMessage,
                )
            ),
            tags(
                (name = "Health", description = "Service health"),
                (name = "Auth", description = "Session management"),
                (name = "Chat", description = "Conversation history"),
            )
        )]
        struct ApiDoc;

        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router.with_state(arc_state)
}
