//! Kore OAuth2 client-credentials authentication.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{KoreError, KoreResult};

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 300;

/// Kore API credentials.
///
/// The gateway key is sent both to the token endpoint and on every API call.
pub struct KoreCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub api_gateway_key: SecretString,
}

impl KoreCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        api_gateway_key: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            api_gateway_key: SecretString::from(api_gateway_key.into()),
        }
    }
}

impl std::fmt::Debug for KoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KoreCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_gateway_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Access token cache with expiry-aware refresh.
///
/// Concurrent callers that find the token stale serialize on the write lock,
/// so only one of them hits the token endpoint.
pub struct TokenCache {
    credentials: KoreCredentials,
    token_url: String,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    grace_period: Duration,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("credentials", &self.credentials)
            .field("token_url", &self.token_url)
            .field("grace_period_secs", &self.grace_period.num_seconds())
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(
        credentials: KoreCredentials,
        token_url: impl Into<String>,
        http_client: reqwest::Client,
        grace_period: Duration,
    ) -> Self {
        Self {
            credentials,
            token_url: token_url.into(),
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period,
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> KoreResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(self.grace_period) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cached_token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cache.as_ref() {
            if !token.is_expired(self.grace_period) {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing Kore access token");
        let token = self.acquire_token().await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }

    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn acquire_token(&self) -> KoreResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            (
                "client_secret",
                self.credentials.client_secret.expose_secret(),
            ),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.credentials.api_gateway_key.expose_secret()),
            )
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .form(&params)
            .send()
            .await
            .map_err(|e| KoreError::Auth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KoreError::Auth(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| KoreError::Auth(format!("Failed to parse token response: {e}")))?;

        let lifetime = token
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + Duration::seconds(lifetime);

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }

    /// Attach the bearer token and gateway key to an API request.
    pub async fn apply(&self, builder: RequestBuilder) -> KoreResult<RequestBuilder> {
        let token = self.get_token().await?;
        Ok(builder
            .bearer_auth(token)
            .header("x-api-key", self.credentials.api_gateway_key.expose_secret()))
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
