//! User and session management.
//!
//! The `Authenticator` is the trusted credential source for the whole
//! backend: every WebSocket upgrade and every REST call resolves its bearer
//! token here before any identity-scoped work happens. Tokens are opaque
//! random values stored server-side with a TTL, never self-describing.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use cuid2::CuidConstructor;
use lynk_config::AuthConfig;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::info;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
    allow_dev_tokens: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
    #[error("user not found")]
    UserNotFound,
    #[error("dev token issuance is disabled")]
    DevTokensDisabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let session_ttl = Duration::seconds(config.session_ttl_seconds as i64);

        Self {
            pool,
            session_ttl,
            allow_dev_tokens: config.allow_dev_tokens,
        }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn dev_tokens_allowed(&self) -> bool {
        self.allow_dev_tokens
    }

    /// Create a new user with a generated public id.
    pub async fn register_user(&self, display_name: Option<&str>) -> Result<User, AuthError> {
        let now = Utc::now().to_rfc3339();
        let public_id = CUID.create_id();

        let result = sqlx::query(
            "INSERT INTO users (public_id, display_name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(display_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let user = User {
            id: result.last_insert_rowid(),
            public_id,
            display_name: display_name.map(str::to_owned),
        };

        info!(user = %user.public_id, "registered user");
        Ok(user)
    }

    /// Create a user and session in one step. Only available when dev
    /// tokens are enabled in configuration.
    pub async fn issue_dev_session(
        &self,
        display_name: Option<&str>,
    ) -> Result<(User, AuthSession), AuthError> {
        if !self.allow_dev_tokens {
            return Err(AuthError::DevTokensDisabled);
        }

        let user = self.register_user(display_name).await?;
        let session = self.issue_session(user.id).await?;
        Ok((user, session))
    }

    pub async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }

    /// Resolve a bearer token to its user. Expired sessions are deleted on
    /// sight so the table does not accumulate dead rows.
    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(user_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id,
            expires_at,
        };

        Ok((user, session))
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.fetch_user(user_id).await
    }

    /// Look up a user by the public id peers address each other with.
    pub async fn user_by_public_id(&self, public_id: &str) -> Result<User, AuthError> {
        let row = sqlx::query("SELECT id, public_id, display_name FROM users WHERE public_id = ?")
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::UserNotFound);
        };

        Ok(User {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            display_name: row.try_get("display_name")?,
        })
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query("SELECT public_id, display_name FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::UserNotFound);
        };

        Ok(User {
            id,
            public_id: row.try_get("public_id")?,
            display_name: row.try_get("display_name")?,
        })
    }
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
