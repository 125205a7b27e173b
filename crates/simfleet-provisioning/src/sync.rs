//! Device sync from the provider's subscription list.

use std::sync::Arc;

use serde::Serialize;
use simfleet_db::{DeviceState, DeviceStore, NewDevice, SyncOutcome};
use simfleet_kore::{ProvisioningApi, Subscription};
use tracing::{info, instrument, warn};

use crate::error::{ProvisioningError, ProvisioningResult};

/// Totals from one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    /// Left alone because a provisioning request is outstanding.
    pub skipped_processing: usize,
    /// Subscriptions that could not be stored, with the reason.
    pub rejected: Vec<(String, String)>,
}

impl SyncReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped_processing + self.rejected.len()
    }
}

/// Refreshes the device mirror from Kore.
pub struct DeviceSync {
    api: Arc<dyn ProvisioningApi>,
    store: Arc<dyn DeviceStore>,
}

impl DeviceSync {
    pub fn new(api: Arc<dyn ProvisioningApi>, store: Arc<dyn DeviceStore>) -> Self {
        Self { api, store }
    }

    /// Pull every subscription and upsert it.
    ///
    /// A listing failure aborts the run. Individual records that fail to map
    /// or store are collected in [`SyncReport::rejected`].
    #[instrument(skip(self))]
    pub async fn run(&self) -> ProvisioningResult<SyncReport> {
        let subscriptions = self
            .api
            .list_subscriptions()
            .await
            .map_err(ProvisioningError::from_provider)?;

        let mut report = SyncReport::default();
        for subscription in subscriptions {
            let subscription_id = subscription.subscription_id.clone();
            let device = match to_new_device(subscription) {
                Ok(device) => device,
                Err(reason) => {
                    warn!(%subscription_id, %reason, "Skipping subscription");
                    report.rejected.push((subscription_id, reason));
                    continue;
                }
            };

            match self.store.upsert_synced(&device).await {
                Ok(SyncOutcome::Inserted) => report.inserted += 1,
                Ok(SyncOutcome::Updated) => report.updated += 1,
                Ok(SyncOutcome::SkippedProcessing) => report.skipped_processing += 1,
                Err(e) if e.is_connection_error() => return Err(e.into()),
                Err(e) => {
                    warn!(%subscription_id, error = %e, "Failed to store subscription");
                    report.rejected.push((subscription_id, e.to_string()));
                }
            }
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            skipped_processing = report.skipped_processing,
            rejected = report.rejected.len(),
            "Device sync finished"
        );
        Ok(report)
    }
}

fn to_new_device(subscription: Subscription) -> Result<NewDevice, String> {
    let state = subscription.state.parse::<DeviceState>()?;
    if state.is_processing() {
        return Err("provider reported the local-only Processing state".to_string());
    }
    Ok(NewDevice {
        subscription_id: subscription.subscription_id,
        iccid: subscription.iccid,
        state,
        msisdn: subscription.msisdn,
        imsi: subscription.imsi,
        imei: subscription.imei,
    })
}
