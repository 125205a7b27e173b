//! Provisioning workflow errors.

use simfleet_db::DbError;
use simfleet_kore::KoreError;
use thiserror::Error;

/// Errors returned by the status change initiator and device sync.
///
/// Per-device reconciliation failures are not errors; they are reported as
/// [`crate::ReconcileOutcome`] values.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The provider rejected our credentials.
    #[error("Provider authentication failed: {0}")]
    Auth(#[source] KoreError),

    /// The provider did not accept the provisioning request.
    /// The local record was not modified.
    #[error("Provisioning request for {subscription_id} was not accepted: {source}")]
    Submission {
        subscription_id: String,
        retryable: bool,
        #[source]
        source: KoreError,
    },

    /// The device already has an outstanding provisioning request.
    #[error("Device {subscription_id} is already processing request {request_id}")]
    AlreadyProcessing {
        subscription_id: String,
        request_id: String,
    },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Another session moved the device to `Processing` between our check and
    /// our write. The request we submitted is orphaned at the provider.
    #[error(
        "Device {subscription_id} entered Processing concurrently; request {orphaned_request_id} is orphaned"
    )]
    ConcurrentRequest {
        subscription_id: String,
        orphaned_request_id: String,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    /// Provider failure outside a submission (e.g. listing subscriptions).
    #[error("Provider error: {0}")]
    Provider(#[source] KoreError),
}

impl ProvisioningError {
    /// Map a failed submission, keeping auth failures distinct.
    pub(crate) fn from_submission(subscription_id: &str, err: KoreError) -> Self {
        if err.is_auth_error() {
            return Self::Auth(err);
        }
        Self::Submission {
            subscription_id: subscription_id.to_string(),
            retryable: err.is_retryable(),
            source: err,
        }
    }

    pub(crate) fn from_provider(err: KoreError) -> Self {
        if err.is_auth_error() {
            Self::Auth(err)
        } else {
            Self::Provider(err)
        }
    }

    /// Check if repeating the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Submission { retryable, .. } => *retryable,
            Self::Persistence(e) => e.is_connection_error(),
            Self::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Stable error code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(_) => "AUTH_ERROR",
            Self::Submission { .. } => "SUBMISSION_ERROR",
            Self::AlreadyProcessing { .. } => "ALREADY_PROCESSING",
            Self::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            Self::ConcurrentRequest { .. } => "CONCURRENT_REQUEST",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

/// Result type for provisioning operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;
