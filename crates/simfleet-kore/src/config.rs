//! Kore client configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{KoreError, KoreResult};
use crate::retry::RetryPolicy;

/// Connection settings for the Kore API.
///
/// Credentials are kept separately in [`crate::KoreCredentials`] so this
/// struct can be logged and serialized freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KoreConfig {
    /// API root, e.g. `https://api.korewireless.com/connectivity`.
    pub api_base_url: String,

    /// OAuth2 token endpoint.
    pub auth_token_url: String,

    /// Kore account the subscriptions belong to.
    pub account_id: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Refresh tokens this many seconds before they expire.
    #[serde(default = "default_token_grace_secs")]
    pub token_grace_secs: u64,

    /// Retry policy for idempotent reads.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Permit plain `http://` URLs. Only for local test servers.
    #[serde(default)]
    pub allow_insecure_http: bool,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_token_grace_secs() -> u64 {
    60
}

impl KoreConfig {
    /// Create a config with default timeouts and retry policy.
    pub fn new(
        api_base_url: impl Into<String>,
        auth_token_url: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            auth_token_url: auth_token_url.into(),
            account_id: account_id.into(),
            request_timeout_secs: default_request_timeout_secs(),
            token_grace_secs: default_token_grace_secs(),
            retry: RetryPolicy::default(),
            allow_insecure_http: false,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_token_grace(mut self, secs: u64) -> Self {
        self.token_grace_secs = secs;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_allow_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    /// Parse and check both URLs and the account id.
    pub fn validate(&self) -> KoreResult<()> {
        self.parsed_base_url()?;
        self.check_url("auth_token_url", &self.auth_token_url)?;

        if self.account_id.trim().is_empty() {
            return Err(KoreError::InvalidConfig(
                "account_id must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(KoreError::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL as a [`Url`] usable for path-segment joins.
    pub(crate) fn parsed_base_url(&self) -> KoreResult<Url> {
        self.check_url("api_base_url", &self.api_base_url)
    }

    fn check_url(&self, field: &str, raw: &str) -> KoreResult<Url> {
        let url = Url::parse(raw)
            .map_err(|e| KoreError::InvalidConfig(format!("{field} is not a valid URL: {e}")))?;

        match url.scheme() {
            "https" => {}
            "http" if self.allow_insecure_http => {}
            other => {
                return Err(KoreError::InvalidConfig(format!(
                    "{field} must use https (got {other})"
                )))
            }
        }
        if url.cannot_be_a_base() {
            return Err(KoreError::InvalidConfig(format!(
                "{field} cannot be used as a base URL"
            )));
        }
        Ok(url)
    }
}
