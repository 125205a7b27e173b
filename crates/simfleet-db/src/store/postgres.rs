//! Postgres-backed device store.

use async_trait::async_trait;
use sqlx::Row;
use tracing::instrument;

use super::{DeviceStore, SyncOutcome, UpdateOutcome};
use crate::error::{DbError, DbResult};
use crate::models::device::{
    DeviceFilter, DevicePatch, DeviceRecord, DeviceRow, DeviceState, NewDevice, StateCount,
};
use crate::pool::DbPool;

const DEVICE_COLUMNS: &str = "subscription_id, iccid, state, provisioning_request_id, \
     intended_state, msisdn, imsi, imei, created_at, updated_at";

/// Device store over the `net_kore_devices` table.
#[derive(Debug, Clone)]
pub struct PgDeviceStore {
    pool: DbPool,
}

impl PgDeviceStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn into_records(rows: Vec<DeviceRow>) -> DbResult<Vec<DeviceRecord>> {
        rows.into_iter().map(DeviceRecord::try_from).collect()
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    #[instrument(skip(self))]
    async fn get(&self, subscription_id: &str) -> DbResult<Option<DeviceRecord>> {
        let query =
            format!("SELECT {DEVICE_COLUMNS} FROM net_kore_devices WHERE subscription_id = $1");
        let row: Option<DeviceRow> = sqlx::query_as(&query)
            .bind(subscription_id)
            .fetch_optional(self.pool.inner())
            .await?;

        row.map(DeviceRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_iccid(&self, iccid: &str) -> DbResult<Option<DeviceRecord>> {
        let query = format!("SELECT {DEVICE_COLUMNS} FROM net_kore_devices WHERE iccid = $1");
        let row: Option<DeviceRow> = sqlx::query_as(&query)
            .bind(iccid)
            .fetch_optional(self.pool.inner())
            .await?;

        row.map(DeviceRecord::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &DeviceFilter) -> DbResult<Vec<DeviceRecord>> {
        let query = format!(
            r"
            SELECT {DEVICE_COLUMNS} FROM net_kore_devices
            WHERE ($1::text IS NULL OR state = $1)
            ORDER BY created_at DESC, subscription_id
            LIMIT $2 OFFSET $3
            "
        );
        let rows: Vec<DeviceRow> = sqlx::query_as(&query)
            .bind(filter.state.map(|s| s.as_str()))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(self.pool.inner())
            .await?;

        Self::into_records(rows)
    }

    #[instrument(skip(self))]
    async fn list_by_state(&self, state: DeviceState) -> DbResult<Vec<DeviceRecord>> {
        let query = format!(
            "SELECT {DEVICE_COLUMNS} FROM net_kore_devices WHERE state = $1 ORDER BY updated_at"
        );
        let rows: Vec<DeviceRow> = sqlx::query_as(&query)
            .bind(state.as_str())
            .fetch_all(self.pool.inner())
            .await?;

        Self::into_records(rows)
    }

    #[instrument(skip(self), fields(request_id = patch.request_id()))]
    async fn update(&self, subscription_id: &str, patch: &DevicePatch) -> DbResult<UpdateOutcome> {
        patch.validate()?;

        let row: Option<DeviceRow> = match patch {
            DevicePatch::BeginProcessing {
                request_id,
                intended_state,
            } => {
                let query = format!(
                    r"
                    UPDATE net_kore_devices
                    SET state = 'Processing',
                        provisioning_request_id = $2,
                        intended_state = $3,
                        updated_at = NOW()
                    WHERE subscription_id = $1 AND state <> 'Processing'
                    RETURNING {DEVICE_COLUMNS}
                    "
                );
                sqlx::query_as(&query)
                    .bind(subscription_id)
                    .bind(request_id)
                    .bind(intended_state.as_str())
                    .fetch_optional(self.pool.inner())
                    .await?
            }
            DevicePatch::Settle { request_id, state } => {
                let query = format!(
                    r"
                    UPDATE net_kore_devices
                    SET state = $3,
                        provisioning_request_id = NULL,
                        intended_state = NULL,
                        updated_at = NOW()
                    WHERE subscription_id = $1
                      AND state = 'Processing'
                      AND provisioning_request_id = $2
                    RETURNING {DEVICE_COLUMNS}
                    "
                );
                sqlx::query_as(&query)
                    .bind(subscription_id)
                    .bind(request_id)
                    .bind(state.as_str())
                    .fetch_optional(self.pool.inner())
                    .await?
            }
        };

        match row {
            Some(row) => Ok(UpdateOutcome::Applied(DeviceRecord::try_from(row)?)),
            None => {
                tracing::debug!(subscription_id, "Conditional update did not apply");
                Ok(UpdateOutcome::Conflict(self.get(subscription_id).await?))
            }
        }
    }

    #[instrument(skip(self, device), fields(subscription_id = %device.subscription_id))]
    async fn upsert_synced(&self, device: &NewDevice) -> DbResult<SyncOutcome> {
        device.validate()?;

        let row = sqlx::query(
            r"
            INSERT INTO net_kore_devices (subscription_id, iccid, state, msisdn, imsi, imei)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subscription_id) DO UPDATE
            SET state = EXCLUDED.state,
                msisdn = EXCLUDED.msisdn,
                imsi = EXCLUDED.imsi,
                imei = COALESCE(EXCLUDED.imei, net_kore_devices.imei),
                updated_at = NOW()
            WHERE net_kore_devices.state <> 'Processing'
              AND net_kore_devices.iccid = EXCLUDED.iccid
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(&device.subscription_id)
        .bind(&device.iccid)
        .bind(device.state.as_str())
        .bind(&device.msisdn)
        .bind(&device.imsi)
        .bind(&device.imei)
        .fetch_optional(self.pool.inner())
        .await?;

        match row {
            Some(row) => {
                let inserted: bool = row.try_get("inserted").map_err(DbError::QueryFailed)?;
                Ok(if inserted {
                    SyncOutcome::Inserted
                } else {
                    SyncOutcome::Updated
                })
            }
            None => match self.get(&device.subscription_id).await? {
                Some(existing) if existing.iccid != device.iccid => Err(DbError::IccidMismatch {
                    subscription_id: device.subscription_id.clone(),
                    stored: existing.iccid,
                    reported: device.iccid.clone(),
                }),
                _ => Ok(SyncOutcome::SkippedProcessing),
            },
        }
    }

    #[instrument(skip(self))]
    async fn count_by_state(&self) -> DbResult<Vec<StateCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"
            SELECT state, COUNT(*) AS count
            FROM net_kore_devices
            GROUP BY state
            ORDER BY count DESC, state ASC
            ",
        )
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter()
            .map(|(state, count)| {
                let state = state.parse::<DeviceState>().map_err(|message| {
                    DbError::InvalidRecord {
                        subscription_id: "*".to_string(),
                        message,
                    }
                })?;
                Ok(StateCount { state, count })
            })
            .collect()
    }
}
