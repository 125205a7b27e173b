//! Reconciliation engine orchestrator.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use simfleet_db::{DevicePatch, DeviceRecord, DeviceState, DeviceStore, UpdateOutcome};
use simfleet_kore::{ProviderRequestStatus, ProvisioningApi, RequestStatusReport, RequestType};
use tracing::{debug, info, instrument, warn};

use super::report::ReconciliationReport;
use super::types::{DeviceReconciliation, ReconcileOutcome};

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Devices polled in parallel.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Upper bound on one status query, retries included.
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_status_timeout_ms() -> u64 {
    15_000
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            status_timeout_ms: default_status_timeout_ms(),
        }
    }
}

/// Terminal state implied by a completed request of the given type.
///
/// Returns `None` for request types we do not know how to settle.
#[must_use]
pub fn derive_terminal_state(request_type: &RequestType) -> Option<DeviceState> {
    match request_type {
        RequestType::Activation | RequestType::Reactivation => Some(DeviceState::Active),
        RequestType::Deactivation => Some(DeviceState::Deactivated),
        RequestType::Suspension => Some(DeviceState::Suspend),
        RequestType::Other(_) => None,
    }
}

/// Polls provisioning requests and settles completed devices.
pub struct ReconciliationEngine {
    api: Arc<dyn ProvisioningApi>,
    store: Arc<dyn DeviceStore>,
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new(
        api: Arc<dyn ProvisioningApi>,
        store: Arc<dyn DeviceStore>,
        config: ReconciliationConfig,
    ) -> Self {
        Self { api, store, config }
    }

    #[must_use]
    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Reconcile the selected devices.
    ///
    /// Devices are handled independently; a failure on one never affects the
    /// others. The report holds exactly one entry per input id, in input order.
    #[instrument(skip(self, subscription_ids), fields(count = subscription_ids.len()))]
    pub async fn reconcile(&self, subscription_ids: &[String]) -> ReconciliationReport {
        let started_at = Utc::now();

        let results: Vec<DeviceReconciliation> = stream::iter(subscription_ids.iter().cloned())
            .map(|id| async move { self.reconcile_device(&id).await })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let report = ReconciliationReport {
            results,
            started_at,
            completed_at: Utc::now(),
        };

        let summary = report.summary();
        info!(
            total = summary.total,
            converged = summary.converged,
            still_processing = summary.still_processing,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = report.duration_ms(),
            "Reconciliation pass finished"
        );

        report
    }

    /// Reconcile a single device.
    #[instrument(skip(self))]
    pub async fn reconcile_device(&self, subscription_id: &str) -> DeviceReconciliation {
        let (request_id, outcome) = match self.store.get(subscription_id).await {
            Ok(Some(device)) => self.reconcile_record(device).await,
            Ok(None) => (None, ReconcileOutcome::NotFound),
            Err(e) => (
                None,
                ReconcileOutcome::LookupFailed {
                    message: e.to_string(),
                },
            ),
        };

        if outcome.is_failure() {
            warn!(
                outcome = outcome.label(),
                detail = %outcome.detail(),
                "Device did not reconcile"
            );
        } else {
            debug!(outcome = outcome.label(), "Device reconciled");
        }

        DeviceReconciliation {
            subscription_id: subscription_id.to_string(),
            request_id,
            outcome,
        }
    }

    async fn reconcile_record(&self, device: DeviceRecord) -> (Option<String>, ReconcileOutcome) {
        if !device.state.is_processing() {
            return (
                None,
                ReconcileOutcome::NotProcessing {
                    state: device.state,
                },
            );
        }
        let Some(request_id) = device.provisioning_request_id.clone() else {
            return (
                None,
                ReconcileOutcome::LookupFailed {
                    message: "device is Processing without a provisioning request id".to_string(),
                },
            );
        };

        let timeout = Duration::from_millis(self.config.status_timeout_ms);
        let report = match tokio::time::timeout(timeout, self.api.request_status(&request_id)).await
        {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                return (
                    Some(request_id),
                    ReconcileOutcome::ProviderError {
                        message: e.to_string(),
                        retryable: e.is_retryable(),
                        raw: e.raw_payload(),
                    },
                )
            }
            Err(_) => {
                return (
                    Some(request_id),
                    ReconcileOutcome::ProviderError {
                        message: format!(
                            "status query timed out after {}ms",
                            self.config.status_timeout_ms
                        ),
                        retryable: true,
                        raw: None,
                    },
                )
            }
        };

        let outcome = self.apply_status(&device, &request_id, report).await;
        (Some(request_id), outcome)
    }

    async fn apply_status(
        &self,
        device: &DeviceRecord,
        request_id: &str,
        report: RequestStatusReport,
    ) -> ReconcileOutcome {
        match &report.status {
            ProviderRequestStatus::InProgress { raw } => {
                return ReconcileOutcome::StillProcessing {
                    provider_status: raw.clone(),
                }
            }
            ProviderRequestStatus::Unexpected { raw } => {
                return ReconcileOutcome::UnexpectedStatus {
                    provider_status: raw.clone(),
                    request_type: report.request_type.as_ref().map(ToString::to_string),
                    raw: report.raw.to_string(),
                }
            }
            ProviderRequestStatus::Completed => {}
        }

        let Some((request_type, state)) = report
            .request_type
            .as_ref()
            .and_then(|rt| derive_terminal_state(rt).map(|state| (rt, state)))
        else {
            return ReconcileOutcome::UnexpectedStatus {
                provider_status: report.status.as_raw().to_string(),
                request_type: report.request_type.as_ref().map(ToString::to_string),
                raw: report.raw.to_string(),
            };
        };

        if let Some(intended) = device.intended_state {
            if intended != state {
                warn!(
                    intended_state = %intended,
                    derived_state = %state,
                    %request_type,
                    "Provider outcome differs from the requested state"
                );
            }
        }

        let patch = DevicePatch::Settle {
            request_id: request_id.to_string(),
            state,
        };
        match self.store.update(&device.subscription_id, &patch).await {
            Ok(UpdateOutcome::Applied(record)) => {
                info!(state = %record.state, %request_type, "Device converged");
                ReconcileOutcome::Converged {
                    state: record.state,
                    request_type: request_type.to_string(),
                }
            }
            Ok(UpdateOutcome::Conflict(Some(current))) => ReconcileOutcome::NotProcessing {
                state: current.state,
            },
            Ok(UpdateOutcome::Conflict(None)) => ReconcileOutcome::NotFound,
            Err(e) => ReconcileOutcome::PersistenceFailed {
                state,
                message: e.to_string(),
            },
        }
    }
}
