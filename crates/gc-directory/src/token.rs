//! Directory credentials
//!
//! Supports:
//! - OAuth2 client-credentials exchange against the directory token endpoint
//! - Optional process-wide caching with expiry-aware refresh

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gc_common::Credentials;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::CredentialError;

/// Lifetime assumed when the token endpoint does not report `expires_in`
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// Remaining lifetime below which a cached token is refreshed
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Bearer credential for the directory service. `Debug` never prints the value.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    obtained_at: DateTime<Utc>,
    expires_in: Option<Duration>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            obtained_at: Utc::now(),
            expires_in,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_LIFETIME);
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or_else(|_| chrono::Duration::zero());
        self.obtained_at + lifetime
    }

    /// Still usable for at least `margin` after `now`
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        now + margin < self.expires_at()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of bearer credentials for directory calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Token endpoint success body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Token endpoint error body (RFC 6749)
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Client-credentials exchange against `{authority}/{tenant}/oauth2/v2.0/token`.
///
/// No retry is attempted; a failed exchange surfaces as [`CredentialError`].
pub struct ClientCredentialsProvider {
    http: reqwest::Client,
    token_url: String,
    credentials: Credentials,
}

impl ClientCredentialsProvider {
    pub fn new(http: reqwest::Client, authority_url: &str, credentials: Credentials) -> Self {
        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority_url.trim_end_matches('/'),
            urlencoding::encode(&credentials.tenant_id)
        );
        Self {
            http,
            token_url,
            credentials,
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsProvider {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", self.credentials.scope.as_str()),
        ];

        debug!(scope = %self.credentials.scope, "Requesting directory access token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(CredentialError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| "unknown_error".to_string());
            warn!(status = status.as_u16(), code = %code, "Token endpoint rejected client credentials");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                code,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CredentialError::InvalidResponse("missing access_token".to_string()))?;

        let expires_in = body.expires_in.as_ref().and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });

        debug!(expires_in = ?expires_in, "Access token obtained");
        Ok(AccessToken::new(value, expires_in.map(Duration::from_secs)))
    }
}

/// Shares one token across concurrent checks until it nears expiry.
///
/// Refreshes happen under the write lock and re-check the cache first, so
/// callers racing on an expired token wait for a single in-flight refresh.
pub struct CachingTokenProvider {
    inner: Arc<dyn TokenSource>,
    cached: RwLock<Option<AccessToken>>,
    refresh_margin: Duration,
}

impl CachingTokenProvider {
    pub fn new(inner: Arc<dyn TokenSource>) -> Self {
        Self {
            inner,
            cached: RwLock::new(None),
            refresh_margin: REFRESH_MARGIN,
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    fn usable(&self, token: Option<&AccessToken>) -> Option<AccessToken> {
        token
            .filter(|t| t.is_fresh_at(Utc::now(), self.refresh_margin))
            .cloned()
    }

    /// Drop the cached token so the next fetch goes to the token endpoint
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[async_trait]
impl TokenSource for CachingTokenProvider {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        if let Some(token) = self.usable(self.cached.read().await.as_ref()) {
            return Ok(token);
        }

        let mut guard = self.cached.write().await;
        if let Some(token) = self.usable(guard.as_ref()) {
            debug!("Token refreshed by a concurrent request");
            return Ok(token);
        }

        let token = self.inner.fetch_token().await?;
        info!(expires_at = %token.expires_at(), "Directory access token refreshed");
        *guard = Some(token.clone());
        Ok(token)
    }
}
