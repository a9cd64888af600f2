use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use lynk_auth::{AuthError, Authenticator};
use lynk_config::AuthConfig;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../database/migrations");

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
        allow_dev_tokens: true,
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
    config: AuthConfig,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let mut options = SqliteConnectOptions::from_str(&db_url)?;
        options = options.create_if_missing(true);
        options = options.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), config.clone());

        Ok(Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
            config,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(default_auth_config()).await
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

#[tokio::test]
async fn register_user_persists_row_with_public_id() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let user = ctx.authenticator().register_user(Some("Alice")).await?;

    assert!(!user.public_id.is_empty());
    assert_eq!(user.display_name.as_deref(), Some("Alice"));

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(user_count, 1, "user row should exist");

    Ok(())
}

#[tokio::test]
async fn register_user_allows_missing_display_name() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let user = ctx.authenticator().register_user(None).await?;
    let fetched = ctx.authenticator().user_profile(user.id).await?;

    assert!(fetched.display_name.is_none());
    Ok(())
}

#[tokio::test]
async fn register_user_assigns_distinct_public_ids() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let first = ctx.authenticator().register_user(Some("Alice")).await?;
    let second = ctx.authenticator().register_user(Some("Bob")).await?;

    assert_ne!(first.public_id, second.public_id);
    Ok(())
}

#[tokio::test]
async fn issue_session_applies_configured_ttl_and_persists_record() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let user = ctx.authenticator().register_user(Some("Alice")).await?;

    let session = ctx.authenticator().issue_session(user.id).await?;

    let ttl = Duration::seconds(ctx.config.session_ttl_seconds as i64);
    let remaining = session.expires_at - Utc::now();
    assert!(
        (remaining - ttl).num_seconds().abs() <= 2,
        "session ttl should respect configuration"
    );

    let stored_expires: String =
        sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token = ?")
            .bind(&session.token)
            .fetch_one(ctx.pool())
            .await?;
    let parsed = DateTime::parse_from_rfc3339(&stored_expires)?.with_timezone(&Utc);
    assert_eq!(parsed, session.expires_at);

    Ok(())
}

#[tokio::test]
async fn issue_session_produces_unique_urlsafe_tokens() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let user = ctx.authenticator().register_user(Some("Alice")).await?;

    let mut tokens = HashSet::new();
    for _ in 0..5 {
        let session = ctx.authenticator().issue_session(user.id).await?;
        assert!(
            URL_SAFE_NO_PAD.decode(session.token.as_bytes()).is_ok(),
            "token should be URL safe base64"
        );
        assert!(
            tokens.insert(session.token.clone()),
            "tokens should be unique per session"
        );
    }
    Ok(())
}

#[tokio::test]
async fn authenticate_token_returns_user_and_session_for_active_token() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let user = ctx.authenticator().register_user(Some("Alice")).await?;
    let session = ctx.authenticator().issue_session(user.id).await?;

    let (resolved_user, resolved_session) = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await?;

    assert_eq!(resolved_user.id, user.id);
    assert_eq!(resolved_user.public_id, user.public_id);
    assert_eq!(resolved_session.token, session.token);
    Ok(())
}

#[tokio::test]
async fn authenticate_token_deletes_expired_sessions() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let user = ctx.authenticator().register_user(Some("Alice")).await?;

    let token = "expired-token";
    let created_at = (Utc::now() - Duration::hours(2)).to_rfc3339();
    let expires_at = (Utc::now() - Duration::hours(1)).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(token)
    .bind(&created_at)
    .bind(&expires_at)
    .execute(ctx.pool())
    .await?;

    let err = ctx
        .authenticator()
        .authenticate_token(token)
        .await
        .expect_err("expired token should be rejected");
    assert!(matches!(err, AuthError::SessionExpired));

    let remaining: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(ctx.pool())
        .await?;
    assert!(
        remaining.is_none(),
        "expired session should be removed from the database"
    );

    Ok(())
}

#[tokio::test]
async fn authenticate_token_rejects_unknown_token() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let err = ctx
        .authenticator()
        .authenticate_token("missing-token")
        .await
        .expect_err("unknown token should not authenticate");
    assert!(matches!(err, AuthError::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn user_by_public_id_resolves_registered_user() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let user = ctx.authenticator().register_user(Some("Alice")).await?;

    let fetched = ctx
        .authenticator()
        .user_by_public_id(&user.public_id)
        .await?;
    assert_eq!(fetched.id, user.id);
    assert_eq!(fetched.display_name.as_deref(), Some("Alice"));

    let err = ctx
        .authenticator()
        .user_by_public_id("no-such-user")
        .await
        .expect_err("unknown public id should fail");
    assert!(matches!(err, AuthError::UserNotFound));

    Ok(())
}

#[tokio::test]
async fn issue_dev_session_creates_user_and_token_in_one_step() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let (user, session) = ctx.authenticator().issue_dev_session(Some("Dev")).await?;
    assert_eq!(session.user_id, user.id);

    let (resolved, _) = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await?;
    assert_eq!(resolved.public_id, user.public_id);

    Ok(())
}

#[tokio::test]
async fn issue_dev_session_respects_configuration_switch() -> TestResult {
    let ctx = TestContext::new(AuthConfig {
        session_ttl_seconds: 3_600,
        allow_dev_tokens: false,
    })
    .await?;

    assert!(!ctx.authenticator().dev_tokens_allowed());

    let err = ctx
        .authenticator()
        .issue_dev_session(Some("Dev"))
        .await
        .expect_err("dev tokens should be disabled");
    assert!(matches!(err, AuthError::DevTokensDisabled));

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(user_count, 0, "no user should be created when disabled");

    Ok(())
}
