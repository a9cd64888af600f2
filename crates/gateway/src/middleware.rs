//! Middleware for authentication and other cross-cutting concerns

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use lynk_auth::User;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::state::GatewayState;

/// The authenticated caller, stored in request extensions by
/// `auth_middleware` and read back by handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authentication middleware that resolves bearer tokens to users.
pub async fn auth_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = bearer_token(&request).ok_or_else(|| {
        GatewayError::AuthenticationFailed("Missing authentication token".to_string())
    })?;

    let (user, _session) = state.authenticator().authenticate_token(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
