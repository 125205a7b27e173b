//! Status change initiator.
//!
//! Submits an activate or deactivate request to the provider and, once the
//! provider accepts it, moves the device to `Processing`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use simfleet_db::{DevicePatch, DeviceRecord, DeviceState, DeviceStore, UpdateOutcome};
use simfleet_kore::{ProvisioningAction, ProvisioningApi, SubscriptionRef};
use tracing::{info, instrument, warn};

use crate::error::{ProvisioningError, ProvisioningResult};

/// Operator-requested state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Activate,
    Deactivate,
}

impl TargetState {
    /// Provider endpoint for this change.
    #[must_use]
    pub fn action(&self) -> ProvisioningAction {
        match self {
            Self::Activate => ProvisioningAction::Activate,
            Self::Deactivate => ProvisioningAction::Deactivate,
        }
    }

    /// Terminal state the device is expected to reach.
    #[must_use]
    pub fn terminal_state(&self) -> DeviceState {
        match self {
            Self::Activate => DeviceState::Active,
            Self::Deactivate => DeviceState::Deactivated,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activate => write!(f, "activate"),
            Self::Deactivate => write!(f, "deactivate"),
        }
    }
}

impl std::str::FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activate" | "active" => Ok(Self::Activate),
            "deactivate" | "deactivated" => Ok(Self::Deactivate),
            _ => Err(format!("Unknown target state: {} (expected activate or deactivate)", s)),
        }
    }
}

/// A provisioning request the provider accepted and the store recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChangeAccepted {
    pub subscription_id: String,
    pub request_id: String,
    pub intended_state: DeviceState,
    pub record: DeviceRecord,
}

/// Submits state changes and records the pending request.
pub struct StatusChangeInitiator {
    api: Arc<dyn ProvisioningApi>,
    store: Arc<dyn DeviceStore>,
}

impl StatusChangeInitiator {
    pub fn new(api: Arc<dyn ProvisioningApi>, store: Arc<dyn DeviceStore>) -> Self {
        Self { api, store }
    }

    /// Request a state change for one device.
    ///
    /// A device already in `Processing` is rejected before anything is sent
    /// to the provider. If the submission fails the record is left untouched.
    /// `imei` overrides the IMEI stored on the record.
    #[instrument(skip(self, imei))]
    pub async fn request_state_change(
        &self,
        subscription_id: &str,
        target: TargetState,
        imei: Option<String>,
    ) -> ProvisioningResult<StateChangeAccepted> {
        let device = self
            .store
            .get(subscription_id)
            .await?
            .ok_or_else(|| ProvisioningError::DeviceNotFound(subscription_id.to_string()))?;

        if device.state.is_processing() {
            return Err(ProvisioningError::AlreadyProcessing {
                subscription_id: subscription_id.to_string(),
                request_id: device.provisioning_request_id.unwrap_or_default(),
            });
        }

        let subscription =
            SubscriptionRef::new(subscription_id).with_imei(imei.or(device.imei));
        let request_id = self
            .api
            .submit(target.action(), &subscription)
            .await
            .map_err(|e| {
                warn!(error = %e, "Provisioning submission failed");
                ProvisioningError::from_submission(subscription_id, e)
            })?;

        let intended_state = target.terminal_state();
        let patch = DevicePatch::BeginProcessing {
            request_id: request_id.clone(),
            intended_state,
        };

        match self.store.update(subscription_id, &patch).await {
            Ok(UpdateOutcome::Applied(record)) => {
                info!(
                    request_id = %request_id,
                    intended_state = %intended_state,
                    "Device moved to Processing"
                );
                Ok(StateChangeAccepted {
                    subscription_id: subscription_id.to_string(),
                    request_id,
                    intended_state,
                    record,
                })
            }
            Ok(UpdateOutcome::Conflict(Some(current))) => {
                warn!(
                    orphaned_request_id = %request_id,
                    current_request_id = ?current.provisioning_request_id,
                    "Device entered Processing concurrently"
                );
                Err(ProvisioningError::ConcurrentRequest {
                    subscription_id: subscription_id.to_string(),
                    orphaned_request_id: request_id,
                })
            }
            Ok(UpdateOutcome::Conflict(None)) => {
                warn!(orphaned_request_id = %request_id, "Device disappeared after submission");
                Err(ProvisioningError::DeviceNotFound(subscription_id.to_string()))
            }
            Err(e) => {
                tracing::error!(
                    orphaned_request_id = %request_id,
                    error = %e,
                    "Provider accepted the request but the device record was not updated"
                );
                Err(ProvisioningError::Persistence(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_state_mapping() {
        assert_eq!(TargetState::Activate.terminal_state(), DeviceState::Active);
        assert_eq!(
            TargetState::Deactivate.terminal_state(),
            DeviceState::Deactivated
        );
        assert_eq!(
            TargetState::Deactivate.action(),
            ProvisioningAction::Deactivate
        );
    }

    #[test]
    fn test_target_state_parse() {
        assert_eq!("Activate".parse::<TargetState>(), Ok(TargetState::Activate));
        assert_eq!(
            "deactivate".parse::<TargetState>(),
            Ok(TargetState::Deactivate)
        );
        assert!("suspend".parse::<TargetState>().is_err());
    }
}
