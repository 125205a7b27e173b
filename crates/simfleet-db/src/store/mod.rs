//! Device store abstraction.
//!
//! All operations touch a single record. State transitions go through
//! [`DeviceStore::update`], which is a compare-and-set: the store decides
//! atomically whether the patch still applies to the current row.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::DbResult;
use crate::models::device::{
    DeviceFilter, DevicePatch, DeviceRecord, DeviceState, NewDevice, StateCount,
};

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The patch was applied; carries the record as written.
    Applied(DeviceRecord),
    /// The precondition did not hold; carries the current record, if any.
    Conflict(Option<DeviceRecord>),
}

impl UpdateOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Result of upserting a device pulled from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted,
    Updated,
    /// The device has an outstanding request and was left untouched.
    SkippedProcessing,
}

/// Persistent device mirror.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Fetch a device by subscription id.
    async fn get(&self, subscription_id: &str) -> DbResult<Option<DeviceRecord>>;

    /// Fetch a device by ICCID.
    async fn find_by_iccid(&self, iccid: &str) -> DbResult<Option<DeviceRecord>>;

    /// List devices, newest first.
    async fn list(&self, filter: &DeviceFilter) -> DbResult<Vec<DeviceRecord>>;

    /// List every device in the given state.
    async fn list_by_state(&self, state: DeviceState) -> DbResult<Vec<DeviceRecord>>;

    /// Apply a conditional state transition.
    async fn update(&self, subscription_id: &str, patch: &DevicePatch) -> DbResult<UpdateOutcome>;

    /// Insert or refresh a device from the provider's listing.
    ///
    /// Devices currently `Processing` are never overwritten.
    async fn upsert_synced(&self, device: &NewDevice) -> DbResult<SyncOutcome>;

    /// Device count per state, largest first.
    async fn count_by_state(&self) -> DbResult<Vec<StateCount>>;
}
