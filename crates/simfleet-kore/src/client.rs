//! Kore API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::auth::{KoreCredentials, TokenCache};
use crate::config::KoreConfig;
use crate::error::{KoreError, KoreResult};
use crate::models::{
    parse_subscriptions, ProvisioningAction, RequestStatusReport, Subscription, SubscriptionRef,
};
use crate::retry::RetryPolicy;
use crate::traits::ProvisioningApi;

/// Authenticated client for one Kore account.
#[derive(Debug)]
pub struct KoreClient {
    http: Client,
    auth: TokenCache,
    base_url: Url,
    account_id: String,
    retry: RetryPolicy,
}

impl KoreClient {
    /// Build a client. Consumes the credentials into the token cache.
    pub fn new(config: KoreConfig, credentials: KoreCredentials) -> KoreResult<Self> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KoreError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        let grace = chrono::Duration::seconds(
            i64::try_from(config.token_grace_secs).unwrap_or(i64::MAX / 1_000),
        );
        let auth = TokenCache::new(credentials, config.auth_token_url, http.clone(), grace);

        Ok(Self {
            http,
            auth,
            base_url,
            account_id: config.account_id,
            retry: config.retry,
        })
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// `{base}/v1/accounts/{account}/{segments...}` with each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> KoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| KoreError::InvalidConfig("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "accounts", self.account_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> KoreResult<Value> {
        let response = self.auth.apply(builder).await?.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(self.handle_error_response(status, body).await);
        }

        serde_json::from_str(&body).map_err(|e| KoreError::Parse {
            message: format!("response is not JSON: {e}"),
            raw: body,
        })
    }

    async fn handle_error_response(&self, status: StatusCode, body: String) -> KoreError {
        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            return KoreError::Auth(format!("Kore API rejected the access token (401): {body}"));
        }
        if status.is_server_error() {
            warn!(status = status.as_u16(), "Kore API server error");
        }
        KoreError::Http {
            status: status.as_u16(),
            body,
        }
    }

    async fn get_json(&self, url: Url) -> KoreResult<Value> {
        self.send(self.http.get(url)).await
    }
}

#[async_trait]
impl ProvisioningApi for KoreClient {
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.subscription_id))]
    async fn submit(
        &self,
        action: ProvisioningAction,
        subscription: &SubscriptionRef,
    ) -> KoreResult<String> {
        let url = self.endpoint(&["provisioning-requests", action.path_segment()])?;
        let body = action.request_body(std::slice::from_ref(subscription));

        let raw = self.send(self.http.post(url).json(&body)).await?;

        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !status.eq_ignore_ascii_case("success") {
            return Err(KoreError::Business {
                status: status.to_string(),
                raw,
            });
        }

        let request_id = raw
            .get("data")
            .and_then(|d| d.get("provisioning-request-id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        match request_id {
            Some(id) => {
                debug!(request_id = %id, "Provisioning request accepted");
                Ok(id)
            }
            None => Err(KoreError::Parse {
                message: "missing provisioning-request-id".to_string(),
                raw: raw.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn request_status(&self, request_id: &str) -> KoreResult<RequestStatusReport> {
        let url = self.endpoint(&["provisioning-requests", request_id])?;
        let raw = self
            .retry
            .execute("request_status", || self.get_json(url.clone()))
            .await?;
        RequestStatusReport::from_payload(raw)
    }

    #[instrument(skip(self))]
    async fn list_subscriptions(&self) -> KoreResult<Vec<Subscription>> {
        let url = self.endpoint(&["subscriptions"])?;
        let raw = self
            .retry
            .execute("list_subscriptions", || self.get_json(url.clone()))
            .await?;
        parse_subscriptions(raw)
    }
}
