//! In-memory device store.
//!
//! Same conditional-update semantics as [`super::postgres::PgDeviceStore`],
//! with a single lock standing in for row-level atomicity. Used by tests and
//! dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DeviceStore, SyncOutcome, UpdateOutcome};
use crate::error::{DbError, DbResult};
use crate::models::device::{
    DeviceFilter, DevicePatch, DeviceRecord, DeviceState, NewDevice, StateCount,
};

#[derive(Debug, Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let devices = records
            .into_iter()
            .map(|r| (r.subscription_id.clone(), r))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Snapshot of every record.
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        let mut all: Vec<_> = self.devices.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.subscription_id.cmp(&b.subscription_id));
        all
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn get(&self, subscription_id: &str) -> DbResult<Option<DeviceRecord>> {
        Ok(self.devices.read().await.get(subscription_id).cloned())
    }

    async fn find_by_iccid(&self, iccid: &str) -> DbResult<Option<DeviceRecord>> {
        Ok(self
            .devices
            .read()
            .await
            .values()
            .find(|d| d.iccid == iccid)
            .cloned())
    }

    async fn list(&self, filter: &DeviceFilter) -> DbResult<Vec<DeviceRecord>> {
        let devices = self.devices.read().await;
        let mut matching: Vec<_> = devices
            .values()
            .filter(|d| filter.state.map_or(true, |s| d.state == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.subscription_id.cmp(&b.subscription_id))
        });

        let offset = usize::try_from(filter.offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit.max(0)).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn list_by_state(&self, state: DeviceState) -> DbResult<Vec<DeviceRecord>> {
        let devices = self.devices.read().await;
        let mut matching: Vec<_> = devices
            .values()
            .filter(|d| d.state == state)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(matching)
    }

    async fn update(&self, subscription_id: &str, patch: &DevicePatch) -> DbResult<UpdateOutcome> {
        patch.validate()?;

        let mut devices = self.devices.write().await;
        let Some(device) = devices.get_mut(subscription_id) else {
            return Ok(UpdateOutcome::Conflict(None));
        };

        match patch {
            DevicePatch::BeginProcessing {
                request_id,
                intended_state,
            } => {
                if device.state.is_processing() {
                    return Ok(UpdateOutcome::Conflict(Some(device.clone())));
                }
                device.state = DeviceState::Processing;
                device.provisioning_request_id = Some(request_id.clone());
                device.intended_state = Some(*intended_state);
            }
            DevicePatch::Settle { request_id, state } => {
                if !device.state.is_processing()
                    || device.provisioning_request_id.as_deref() != Some(request_id.as_str())
                {
                    return Ok(UpdateOutcome::Conflict(Some(device.clone())));
                }
                device.state = *state;
                device.provisioning_request_id = None;
                device.intended_state = None;
            }
        }
        device.updated_at = Utc::now();

        Ok(UpdateOutcome::Applied(device.clone()))
    }

    async fn upsert_synced(&self, device: &NewDevice) -> DbResult<SyncOutcome> {
        device.validate()?;

        let mut devices = self.devices.write().await;
        let now = Utc::now();
        match devices.get_mut(&device.subscription_id) {
            Some(existing) if existing.iccid != device.iccid => Err(DbError::IccidMismatch {
                subscription_id: device.subscription_id.clone(),
                stored: existing.iccid.clone(),
                reported: device.iccid.clone(),
            }),
            Some(existing) if existing.state.is_processing() => Ok(SyncOutcome::SkippedProcessing),
            Some(existing) => {
                existing.state = device.state;
                existing.msisdn.clone_from(&device.msisdn);
                existing.imsi.clone_from(&device.imsi);
                if device.imei.is_some() {
                    existing.imei.clone_from(&device.imei);
                }
                existing.updated_at = now;
                Ok(SyncOutcome::Updated)
            }
            None => {
                devices.insert(
                    device.subscription_id.clone(),
                    DeviceRecord {
                        subscription_id: device.subscription_id.clone(),
                        iccid: device.iccid.clone(),
                        state: device.state,
                        provisioning_request_id: None,
                        intended_state: None,
                        msisdn: device.msisdn.clone(),
                        imsi: device.imsi.clone(),
                        imei: device.imei.clone(),
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(SyncOutcome::Inserted)
            }
        }
    }

    async fn count_by_state(&self) -> DbResult<Vec<StateCount>> {
        let devices = self.devices.read().await;
        let mut counts: HashMap<DeviceState, i64> = HashMap::new();
        for device in devices.values() {
            *counts.entry(device.state).or_default() += 1;
        }

        let mut counts: Vec<StateCount> = counts
            .into_iter()
            .map(|(state, count)| StateCount { state, count })
            .collect();
        counts.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.state.as_str().cmp(b.state.as_str()))
        });
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(sub: &str, iccid: &str, state: DeviceState) -> NewDevice {
        NewDevice {
            subscription_id: sub.to_string(),
            iccid: iccid.to_string(),
            state,
            msisdn: None,
            imsi: None,
            imei: None,
        }
    }

    fn begin(request_id: &str, intended: DeviceState) -> DevicePatch {
        DevicePatch::BeginProcessing {
            request_id: request_id.to_string(),
            intended_state: intended,
        }
    }

    fn settle(request_id: &str, state: DeviceState) -> DevicePatch {
        DevicePatch::Settle {
            request_id: request_id.to_string(),
            state,
        }
    }

    #[tokio::test]
    async fn test_begin_processing_sets_linkage() {
        let store = InMemoryDeviceStore::new();
        store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
            .await
            .unwrap();

        let outcome = store
            .update("sub-001", &begin("req-42", DeviceState::Deactivated))
            .await
            .unwrap();

        let UpdateOutcome::Applied(record) = outcome else {
            panic!("expected applied, got {outcome:?}");
        };
        assert_eq!(record.state, DeviceState::Processing);
        assert_eq!(record.provisioning_request_id.as_deref(), Some("req-42"));
        assert_eq!(record.intended_state, Some(DeviceState::Deactivated));
        assert!(record.is_consistent());
    }

    #[tokio::test]
    async fn test_second_begin_conflicts_and_keeps_first_request() {
        let store = InMemoryDeviceStore::new();
        store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
            .await
            .unwrap();
        store
            .update("sub-001", &begin("req-1", DeviceState::Deactivated))
            .await
            .unwrap();

        let outcome = store
            .update("sub-001", &begin("req-2", DeviceState::Active))
            .await
            .unwrap();

        match outcome {
            UpdateOutcome::Conflict(Some(current)) => {
                assert_eq!(current.provisioning_request_id.as_deref(), Some("req-1"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_settle_requires_matching_request() {
        let store = InMemoryDeviceStore::new();
        store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
            .await
            .unwrap();
        store
            .update("sub-001", &begin("req-1", DeviceState::Deactivated))
            .await
            .unwrap();

        let stale = store
            .update("sub-001", &settle("req-0", DeviceState::Deactivated))
            .await
            .unwrap();
        assert!(!stale.is_applied());

        let applied = store
            .update("sub-001", &settle("req-1", DeviceState::Deactivated))
            .await
            .unwrap();
        let UpdateOutcome::Applied(record) = applied else {
            panic!("expected applied");
        };
        assert_eq!(record.state, DeviceState::Deactivated);
        assert!(record.provisioning_request_id.is_none());
        assert!(record.intended_state.is_none());

        let again = store
            .update("sub-001", &settle("req-1", DeviceState::Deactivated))
            .await
            .unwrap();
        assert!(!again.is_applied());
    }

    #[tokio::test]
    async fn test_update_unknown_device_conflicts_without_record() {
        let store = InMemoryDeviceStore::new();
        let outcome = store
            .update("missing", &begin("req-1", DeviceState::Active))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict(None));
    }

    #[tokio::test]
    async fn test_sync_never_overwrites_processing() {
        let store = InMemoryDeviceStore::new();
        assert_eq!(
            store
                .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
                .await
                .unwrap(),
            SyncOutcome::Inserted
        );
        store
            .update("sub-001", &begin("req-1", DeviceState::Deactivated))
            .await
            .unwrap();

        let outcome = store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::SkippedProcessing);

        let record = store.get("sub-001").await.unwrap().unwrap();
        assert_eq!(record.state, DeviceState::Processing);
        assert_eq!(record.provisioning_request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_sync_keeps_stored_iccid() {
        let store = InMemoryDeviceStore::new();
        store
            .upsert_synced(&synced("sub-001", "8901000000000000001", DeviceState::Active))
            .await
            .unwrap();

        let err = store
            .upsert_synced(&synced("sub-001", "8901999999999999999", DeviceState::Suspend))
            .await
            .unwrap_err();
        assert!(err.is_iccid_mismatch());
        assert_eq!(err.error_code(), "DB_ICCID_MISMATCH");

        let record = store.get("sub-001").await.unwrap().unwrap();
        assert_eq!(record.iccid, "8901000000000000001");
        assert_eq!(record.state, DeviceState::Active);
    }

    #[tokio::test]
    async fn test_sync_updates_terminal_device() {
        let store = InMemoryDeviceStore::new();
        store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Stock))
            .await
            .unwrap();
        let outcome = store
            .upsert_synced(&synced("sub-001", "8901001", DeviceState::Active))
            .await
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(
            store.get("sub-001").await.unwrap().unwrap().state,
            DeviceState::Active
        );
    }

    #[tokio::test]
    async fn test_count_by_state_orders_by_count_then_name() {
        let store = InMemoryDeviceStore::new();
        for (sub, state) in [
            ("a", DeviceState::Stock),
            ("b", DeviceState::Active),
            ("c", DeviceState::Active),
            ("d", DeviceState::Barred),
        ] {
            store
                .upsert_synced(&synced(sub, &format!("iccid-{sub}"), state))
                .await
                .unwrap();
        }

        let counts = store.count_by_state().await.unwrap();
        let flat: Vec<_> = counts.iter().map(|c| (c.state, c.count)).collect();
        assert_eq!(
            flat,
            vec![
                (DeviceState::Active, 2),
                (DeviceState::Barred, 1),
                (DeviceState::Stock, 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let store = InMemoryDeviceStore::new();
        for i in 0..5 {
            let state = if i % 2 == 0 {
                DeviceState::Active
            } else {
                DeviceState::Stock
            };
            store
                .upsert_synced(&synced(&format!("sub-{i}"), &format!("iccid-{i}"), state))
                .await
                .unwrap();
        }

        let active = store
            .list(&DeviceFilter {
                state: Some(DeviceState::Active),
                ..DeviceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 3);

        let page = store
            .list(&DeviceFilter {
                state: None,
                limit: 2,
                offset: 4,
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);

        let by_iccid = store.find_by_iccid("iccid-3").await.unwrap().unwrap();
        assert_eq!(by_iccid.subscription_id, "sub-3");
    }
}
