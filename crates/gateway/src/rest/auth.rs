//! Authentication REST endpoints
//!
//! Real credential issuance lives in an external identity service; the dev
//! token endpoint is a development convenience gated by configuration.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::AuthenticatedUser;
use crate::state::GatewayState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevTokenRequest {
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<lynk_auth::User> for UserResponse {
    fn from(user: lynk_auth::User) -> Self {
        Self {
            id: user.public_id,
            display_name: user.display_name,
        }
    }
}

/// Development endpoint: create a user and issue a session token in one step.
#[utoipa::path(
    post,
    path = "/api/auth/dev/token",
    tag = "Auth",
    request_body = DevTokenRequest,
    responses(
        (status = 200, description = "Development session issued", body = SessionResponse),
        (status = 403, description = "Dev tokens are disabled", body = ErrorResponse)
    )
)]
pub async fn dev_token(
    State(state): State<Arc<GatewayState>>,
    payload: Option<Json<DevTokenRequest>>,
) -> GatewayResult<Json<SessionResponse>> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();

    let (user, session) = state
        .authenticator()
        .issue_dev_session(request.display_name.as_deref())
        .await?;

    Ok(Json(SessionResponse {
        token: session.token,
        user: user.into(),
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

/// Current caller, resolved from the bearer token.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user information", body = UserResponse),
        (status = 401, description = "Invalid token", body = ErrorResponse)
    )
)]
pub async fn me(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> GatewayResult<Json<UserResponse>> {
    Ok(Json(UserResponse::from(user)))
}
