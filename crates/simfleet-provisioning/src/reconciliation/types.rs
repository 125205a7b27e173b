//! Per-device reconciliation results.

use serde::{Deserialize, Serialize};
use simfleet_db::DeviceState;

/// What happened to one device during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The request completed and the device was settled.
    Converged {
        state: DeviceState,
        request_type: String,
    },

    /// The provider is still working on the request. Not an error.
    StillProcessing { provider_status: String },

    /// The provider returned a status or request type we cannot map.
    UnexpectedStatus {
        provider_status: String,
        request_type: Option<String>,
        raw: String,
    },

    /// The status query failed or timed out. `raw` holds the provider's
    /// payload when one was received.
    ProviderError {
        message: String,
        retryable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },

    /// The provider reported completion but the store write failed. The
    /// device stays `Processing` and converges on the next pass.
    PersistenceFailed { state: DeviceState, message: String },

    /// The device is not `Processing` (already settled, or never submitted).
    NotProcessing { state: DeviceState },

    NotFound,

    /// The store could not be read.
    LookupFailed { message: String },
}

impl ReconcileOutcome {
    /// Short label for tables and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Converged { .. } => "converged",
            Self::StillProcessing { .. } => "still_processing",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::ProviderError { .. } => "provider_error",
            Self::PersistenceFailed { .. } => "persistence_failed",
            Self::NotProcessing { .. } => "not_processing",
            Self::NotFound => "not_found",
            Self::LookupFailed { .. } => "lookup_failed",
        }
    }

    #[must_use]
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    #[must_use]
    pub fn is_still_processing(&self) -> bool {
        matches!(self, Self::StillProcessing { .. })
    }

    /// A failure the operator should look at.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::ProviderError { .. }
                | Self::PersistenceFailed { .. }
                | Self::LookupFailed { .. }
        )
    }

    /// Human-readable detail.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Converged {
                state,
                request_type,
            } => format!("{request_type} completed, now {state}"),
            Self::StillProcessing { provider_status } => {
                format!("provider status: {provider_status}")
            }
            Self::UnexpectedStatus {
                provider_status,
                request_type,
                raw,
            } => match request_type {
                Some(rt) => format!("status '{provider_status}' for {rt}: {raw}"),
                None => format!("status '{provider_status}': {raw}"),
            },
            Self::ProviderError {
                message,
                retryable,
                raw,
            } => {
                let mut detail = message.clone();
                if let Some(raw) = raw.as_deref().filter(|r| !message.contains(*r)) {
                    detail.push_str(": ");
                    detail.push_str(raw);
                }
                if *retryable {
                    detail.push_str(" (will retry)");
                }
                detail
            }
            Self::PersistenceFailed { state, message } => {
                format!("provider reports {state}, store write failed: {message}")
            }
            Self::NotProcessing { state } => format!("device is {state}"),
            Self::NotFound => "device not found".to_string(),
            Self::LookupFailed { message } => message.clone(),
        }
    }
}

/// Result for one selected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceReconciliation {
    pub subscription_id: String,
    /// Request that was polled, when the device had one.
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}
