//! Kore device model.
//!
//! Mirrors one SIM subscription held at the provider, plus the linkage to an
//! outstanding provisioning request while one exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DbError;

/// Device state.
///
/// Every variant except `Processing` is a provider-defined terminal state.
/// `Processing` is local only and marks an outstanding provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Stock,
    Active,
    Suspend,
    #[serde(rename = "Suspend With Charge")]
    SuspendWithCharge,
    Deactivated,
    #[serde(rename = "Pending Scrap")]
    PendingScrap,
    Scrapped,
    Barred,
    Processing,
}

impl DeviceState {
    /// All provider-defined terminal states.
    pub const TERMINAL: [DeviceState; 8] = [
        Self::Stock,
        Self::Active,
        Self::Suspend,
        Self::SuspendWithCharge,
        Self::Deactivated,
        Self::PendingScrap,
        Self::Scrapped,
        Self::Barred,
    ];

    /// Stored representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stock => "Stock",
            Self::Active => "Active",
            Self::Suspend => "Suspend",
            Self::SuspendWithCharge => "Suspend With Charge",
            Self::Deactivated => "Deactivated",
            Self::PendingScrap => "Pending Scrap",
            Self::Scrapped => "Scrapped",
            Self::Barred => "Barred",
            Self::Processing => "Processing",
        }
    }

    /// Check if a provisioning request is outstanding.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Check if this is a provider-defined terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_processing()
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "stock" => Ok(Self::Stock),
            "active" => Ok(Self::Active),
            "suspend" => Ok(Self::Suspend),
            "suspendwithcharge" => Ok(Self::SuspendWithCharge),
            "deactivated" => Ok(Self::Deactivated),
            "pendingscrap" => Ok(Self::PendingScrap),
            "scrapped" => Ok(Self::Scrapped),
            "barred" => Ok(Self::Barred),
            "processing" => Ok(Self::Processing),
            _ => Err(format!("Unknown device state: {}", s)),
        }
    }
}

/// A device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub subscription_id: String,
    pub iccid: String,
    pub state: DeviceState,
    pub provisioning_request_id: Option<String>,
    pub intended_state: Option<DeviceState>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub imei: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Describe how this record breaks the request-linkage invariants, if it does.
    #[must_use]
    pub fn invariant_violation(&self) -> Option<String> {
        match (self.state, &self.provisioning_request_id) {
            (DeviceState::Processing, None) => {
                return Some("Processing without provisioning_request_id".to_string())
            }
            (state, Some(id)) if state.is_terminal() => {
                return Some(format!("{state} with provisioning_request_id {id}"))
            }
            _ => {}
        }
        match self.intended_state {
            Some(intended) if self.state.is_terminal() => Some(format!(
                "{} with intended_state {}",
                self.state, intended
            )),
            Some(DeviceState::Processing) => Some("intended_state is Processing".to_string()),
            _ => None,
        }
    }

    /// Check the request-linkage invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.invariant_violation().is_none()
    }
}

/// Raw row as stored in `net_kore_devices`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DeviceRow {
    pub subscription_id: String,
    pub iccid: String,
    pub state: String,
    pub provisioning_request_id: Option<String>,
    pub intended_state: Option<String>,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub imei: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DeviceRow> for DeviceRecord {
    type Error = DbError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let invalid = |message: String| DbError::InvalidRecord {
            subscription_id: row.subscription_id.clone(),
            message,
        };
        let state = row.state.parse::<DeviceState>().map_err(invalid)?;
        let intended_state = row
            .intended_state
            .as_deref()
            .map(str::parse::<DeviceState>)
            .transpose()
            .map_err(invalid)?;

        Ok(Self {
            subscription_id: row.subscription_id,
            iccid: row.iccid,
            state,
            provisioning_request_id: row.provisioning_request_id,
            intended_state,
            msisdn: row.msisdn,
            imsi: row.imsi,
            imei: row.imei,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Conditional state transition applied by [`crate::DeviceStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePatch {
    /// Enter `Processing`. Applies only if the device is not already `Processing`.
    BeginProcessing {
        request_id: String,
        intended_state: DeviceState,
    },
    /// Leave `Processing` for a terminal state. Applies only if the device is
    /// still `Processing` for the same request.
    Settle {
        request_id: String,
        state: DeviceState,
    },
}

impl DevicePatch {
    /// Reject patches that could never leave a record consistent.
    pub fn validate(&self) -> Result<(), DbError> {
        let (request_id, target) = match self {
            Self::BeginProcessing {
                request_id,
                intended_state,
            } => (request_id, intended_state),
            Self::Settle { request_id, state } => (request_id, state),
        };
        if request_id.trim().is_empty() {
            return Err(DbError::ValidationFailed(
                "provisioning request id must not be empty".to_string(),
            ));
        }
        if !target.is_terminal() {
            return Err(DbError::ValidationFailed(format!(
                "target state must be terminal, got {target}"
            )));
        }
        Ok(())
    }

    /// Request id carried by the patch.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::BeginProcessing { request_id, .. } | Self::Settle { request_id, .. } => {
                request_id
            }
        }
    }
}

/// Device data pulled from the provider's subscription list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevice {
    pub subscription_id: String,
    pub iccid: String,
    pub state: DeviceState,
    pub msisdn: Option<String>,
    pub imsi: Option<String>,
    pub imei: Option<String>,
}

impl NewDevice {
    pub fn validate(&self) -> Result<(), DbError> {
        if self.subscription_id.trim().is_empty() || self.iccid.trim().is_empty() {
            return Err(DbError::ValidationFailed(
                "subscription_id and iccid are required".to_string(),
            ));
        }
        if !self.state.is_terminal() {
            return Err(DbError::ValidationFailed(format!(
                "synced device {} cannot be stored as {}",
                self.subscription_id, self.state
            )));
        }
        Ok(())
    }
}

/// Listing filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub state: Option<DeviceState>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            state: None,
            limit: 100,
            offset: 0,
        }
    }
}

/// Number of devices in one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCount {
    pub state: DeviceState,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(state: DeviceState, request_id: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            subscription_id: "sub-001".to_string(),
            iccid: "8901000000000000001".to_string(),
            state,
            provisioning_request_id: request_id.map(String::from),
            intended_state: None,
            msisdn: None,
            imsi: None,
            imei: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in DeviceState::TERMINAL {
            assert_eq!(state.as_str().parse::<DeviceState>(), Ok(state));
        }
        assert_eq!(
            "Processing".parse::<DeviceState>(),
            Ok(DeviceState::Processing)
        );
    }

    #[test]
    fn test_state_parse_is_lenient() {
        assert_eq!(
            "suspend_with_charge".parse::<DeviceState>(),
            Ok(DeviceState::SuspendWithCharge)
        );
        assert_eq!(
            "pending-scrap".parse::<DeviceState>(),
            Ok(DeviceState::PendingScrap)
        );
        assert!("flying".parse::<DeviceState>().is_err());
    }

    #[test]
    fn test_state_serde_uses_provider_names() {
        let json = serde_json::to_string(&DeviceState::SuspendWithCharge).unwrap();
        assert_eq!(json, "\"Suspend With Charge\"");
    }

    #[test]
    fn test_processing_requires_request_id() {
        assert!(!record(DeviceState::Processing, None).is_consistent());
        assert!(record(DeviceState::Processing, Some("req-1")).is_consistent());
    }

    #[test]
    fn test_terminal_rejects_request_id_and_intent() {
        assert!(!record(DeviceState::Active, Some("req-1")).is_consistent());

        let mut rec = record(DeviceState::Active, None);
        rec.intended_state = Some(DeviceState::Deactivated);
        assert!(!rec.is_consistent());
    }

    #[test]
    fn test_patch_validation() {
        let ok = DevicePatch::BeginProcessing {
            request_id: "req-1".to_string(),
            intended_state: DeviceState::Active,
        };
        assert!(ok.validate().is_ok());

        let empty = DevicePatch::Settle {
            request_id: "  ".to_string(),
            state: DeviceState::Active,
        };
        assert!(empty.validate().unwrap_err().is_validation_failed());

        let to_processing = DevicePatch::Settle {
            request_id: "req-1".to_string(),
            state: DeviceState::Processing,
        };
        assert!(to_processing.validate().is_err());
    }

    #[test]
    fn test_row_with_unknown_state_is_invalid() {
        let row = DeviceRow {
            subscription_id: "sub-9".to_string(),
            iccid: "89".to_string(),
            state: "Flying".to_string(),
            provisioning_request_id: None,
            intended_state: None,
            msisdn: None,
            imsi: None,
            imei: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = DeviceRecord::try_from(row).unwrap_err();
        assert_eq!(err.error_code(), "DB_INVALID_RECORD");
    }
}
