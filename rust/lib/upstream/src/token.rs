//! Upstream credentials.
//!
//! Every upstream request asks its [`TokenSource`] for the value of the
//! `Authorization` header. Implementations handle acquisition, caching
//! and refresh (Go-style `oauth2.TokenSource` pattern).

use serde::Deserialize;

use crate::error::ApiError;

/// Seconds subtracted from the advertised lifetime so a token is refreshed
/// before the upstream starts rejecting it.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Pluggable credential provider. Called before every upstream request.
///
/// Returns the complete `Authorization` header value, or `Ok(None)` to
/// send the request anonymously.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn authorization(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication; requests go out anonymous.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn authorization(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Pre-issued credential, sent verbatim as the header value.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn authorization(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

/// Password-based login against the upstream. Lazily authenticates on
/// first use, caches the bearer token, and logs in again shortly before
/// it expires.
pub struct PasswordLogin {
    http: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
    cached: tokio::sync::RwLock<Option<CachedToken>>,
}

struct CachedToken {
    access_token: String,
    /// Absolute expiry timestamp (seconds since epoch), margin applied.
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        chrono::Utc::now().timestamp() < self.expires_at
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    expires_in: u64,
}

impl PasswordLogin {
    /// `login_url` is the full URL of the upstream login endpoint.
    pub fn new(
        login_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            login_url: login_url.into(),
            username: username.into(),
            password: password.into(),
            cached: tokio::sync::RwLock::new(None),
        }
    }

    /// Drop the cached token; the next call logs in again.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn do_login(&self) -> Result<CachedToken, ApiError> {
        tracing::debug!(url = %self.login_url, user = %self.username, "logging into upstream");
        let resp = self
            .http
            .post(&self.login_url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!("login failed ({}): {}", status, body)));
        }

        let lr: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("login response: {}", e)))?;

        let now = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(lr.expires_in).unwrap_or(i64::MAX / 2);
        let expires_at = now.saturating_add(lifetime) - EXPIRY_MARGIN_SECS;

        Ok(CachedToken {
            access_token: lr.access_token,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenSource for PasswordLogin {
    async fn authorization(&self) -> Result<Option<String>, ApiError> {
        // Fast path: read lock, check cache.
        {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref().filter(|c| c.is_fresh()) {
                return Ok(Some(format!("Bearer {}", cached.access_token)));
            }
        }

        // Slow path: write lock, re-check, login.
        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_ref().filter(|c| c.is_fresh()) {
            return Ok(Some(format!("Bearer {}", cached.access_token)));
        }

        let fresh = self.do_login().await?;
        let header = format!("Bearer {}", fresh.access_token);
        *guard = Some(fresh);
        tracing::info!("upstream token refreshed");
        Ok(Some(header))
    }
}
