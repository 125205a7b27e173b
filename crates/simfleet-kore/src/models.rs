//! Kore provisioning API payloads.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::{KoreError, KoreResult};

/// Provisioning endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningAction {
    Activate,
    Deactivate,
}

impl ProvisioningAction {
    /// Final path segment of the provisioning endpoint.
    #[must_use]
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        }
    }

    /// Request body for the given subscriptions.
    #[must_use]
    pub fn request_body(&self, subscriptions: &[SubscriptionRef]) -> Value {
        match self {
            Self::Activate => json!({
                "activate": {
                    "activation-state": "active",
                    "subscriptions": subscriptions,
                }
            }),
            Self::Deactivate => json!({
                "deactivate": {
                    "subscriptions": subscriptions,
                }
            }),
        }
    }
}

impl fmt::Display for ProvisioningAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl std::str::FromStr for ProvisioningAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activate" => Ok(Self::Activate),
            "deactivate" => Ok(Self::Deactivate),
            _ => Err(format!("Unknown provisioning action: {}", s)),
        }
    }
}

/// Subscription entry inside a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRef {
    #[serde(rename = "subscription-id")]
    pub subscription_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imei: Option<String>,
}

impl SubscriptionRef {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            imei: None,
        }
    }

    #[must_use]
    pub fn with_imei(mut self, imei: Option<String>) -> Self {
        self.imei = imei;
        self
    }
}

/// Lifecycle status of a provisioning request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderRequestStatus {
    Completed,
    /// `submitted` or `pending`; `raw` keeps which one.
    InProgress { raw: String },
    /// Anything else the provider returns.
    Unexpected { raw: String },
}

impl ProviderRequestStatus {
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" => Self::Completed,
            "submitted" | "pending" => Self::InProgress {
                raw: raw.to_string(),
            },
            _ => Self::Unexpected {
                raw: raw.to_string(),
            },
        }
    }

    /// Status string as the provider sent it.
    #[must_use]
    pub fn as_raw(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::InProgress { raw } | Self::Unexpected { raw } => raw,
        }
    }
}

/// Kind of provisioning request, as reported back by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    Activation,
    Reactivation,
    Deactivation,
    Suspension,
    Other(String),
}

impl RequestType {
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "activation" | "activate" => Self::Activation,
            "reactivation" | "reactivate" => Self::Reactivation,
            "deactivation" | "deactivate" => Self::Deactivation,
            "suspension" | "suspend" => Self::Suspension,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation => f.write_str("Activation"),
            Self::Reactivation => f.write_str("Reactivation"),
            Self::Deactivation => f.write_str("Deactivation"),
            Self::Suspension => f.write_str("Suspension"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

const REQUEST_TYPE_KEYS: [&str; 3] = ["request-type", "requestType", "request_type"];

/// Parsed provisioning request status.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestStatusReport {
    pub status: ProviderRequestStatus,
    pub request_type: Option<RequestType>,
    /// Full response body.
    pub raw: Value,
}

impl RequestStatusReport {
    /// Parse a status response.
    ///
    /// Accepts the enveloped shape `{"status": "success", "data": {...}}` and
    /// the flat shape `{"status": ..., "requestType": ...}`.
    pub fn from_payload(raw: Value) -> KoreResult<Self> {
        let enveloped = raw.get("data").is_some_and(Value::is_object);
        let body = if enveloped {
            let outer = raw
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !outer.eq_ignore_ascii_case("success") {
                return Err(KoreError::Business {
                    status: outer.to_string(),
                    raw,
                });
            }
            &raw["data"]
        } else {
            &raw
        };

        let Some(status) = body.get("status").and_then(Value::as_str) else {
            return Err(KoreError::Parse {
                message: "missing request status".to_string(),
                raw: raw.to_string(),
            });
        };
        let status = ProviderRequestStatus::from_raw(status);
        let request_type = REQUEST_TYPE_KEYS
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(RequestType::from_raw);

        Ok(Self {
            status,
            request_type,
            raw,
        })
    }
}

/// Subscription as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Subscription {
    pub subscription_id: String,
    pub iccid: String,
    #[serde(alias = "status")]
    pub state: String,
    #[serde(default)]
    pub msisdn: Option<String>,
    #[serde(default)]
    pub imsi: Option<String>,
    #[serde(default)]
    pub imei: Option<String>,
}

/// Extract the subscription list from any of the listing shapes.
pub(crate) fn parse_subscriptions(raw: Value) -> KoreResult<Vec<Subscription>> {
    let list = match &raw {
        Value::Array(_) => raw.clone(),
        Value::Object(obj) => match obj.get("data") {
            Some(Value::Array(_)) => obj["data"].clone(),
            Some(Value::Object(data)) => data.get("subscriptions").cloned().unwrap_or(Value::Null),
            _ => obj.get("subscriptions").cloned().unwrap_or(Value::Null),
        },
        _ => Value::Null,
    };

    if !list.is_array() {
        return Err(KoreError::Parse {
            message: "subscription list not found".to_string(),
            raw: raw.to_string(),
        });
    }

    serde_json::from_value(list).map_err(|e| KoreError::Parse {
        message: format!("invalid subscription entry: {e}"),
        raw: raw.to_string(),
    })
}
