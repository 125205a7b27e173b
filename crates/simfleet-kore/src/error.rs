//! Kore client error types.

use thiserror::Error;

/// Errors returned by the Kore client.
#[derive(Debug, Error)]
pub enum KoreError {
    /// Token acquisition failed or the API rejected the token.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-2xx HTTP response.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 2xx response whose business status is not `success`.
    #[error("Provider returned status '{status}'")]
    Business {
        status: String,
        raw: serde_json::Value,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response: {message}")]
    Parse { message: String, raw: String },

    /// Client configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transient failures persisted through every retry.
    #[error("Max retries exceeded after {attempts} attempt(s): {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

impl KoreError {
    /// Check if the failure is transient and the call may succeed if repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            KoreError::Network(_)
            | KoreError::Timeout(_)
            | KoreError::MaxRetriesExceeded { .. } => true,
            KoreError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Check if this is an authentication failure.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, KoreError::Auth(_))
    }

    /// Check if the provider answered with a 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, KoreError::Http { status, .. } if *status >= 500)
    }

    /// Raw provider payload, when one was received.
    #[must_use]
    pub fn raw_payload(&self) -> Option<String> {
        match self {
            KoreError::Http { body, .. } => Some(body.clone()),
            KoreError::Business { raw, .. } => Some(raw.to_string()),
            KoreError::Parse { raw, .. } => Some(raw.clone()),
            _ => None,
        }
    }

    /// Stable error code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            KoreError::Auth(_) => "KORE_AUTH",
            KoreError::Network(_) => "KORE_NETWORK",
            KoreError::Timeout(_) => "KORE_TIMEOUT",
            KoreError::Http { .. } => "KORE_HTTP",
            KoreError::Business { .. } => "KORE_BUSINESS",
            KoreError::Parse { .. } => "KORE_PARSE",
            KoreError::InvalidConfig(_) => "KORE_INVALID_CONFIG",
            KoreError::MaxRetriesExceeded { .. } => "KORE_MAX_RETRIES",
        }
    }
}

impl From<reqwest::Error> for KoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KoreError::Timeout(err.to_string())
        } else {
            KoreError::Network(err.to_string())
        }
    }
}

/// Result type for Kore client operations.
pub type KoreResult<T> = Result<T, KoreError>;
