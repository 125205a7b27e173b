//! Command implementations for simfleet

pub mod change_status;
pub mod devices;
pub mod migrate;
pub mod reconcile;
pub mod sync;
pub mod watch;

use std::sync::Arc;

use simfleet_db::{DbPool, DeviceStore, PgDeviceStore};
use simfleet_kore::{KoreClient, KoreConfig, KoreCredentials, ProvisioningApi};

use crate::error::CliResult;

/// Connect to Postgres and wrap the pool in a device store.
pub(crate) async fn connect_store(
    database_url: &str,
    max_connections: u32,
) -> CliResult<Arc<dyn DeviceStore>> {
    let pool = DbPool::connect_with(database_url, max_connections).await?;
    Ok(Arc::new(PgDeviceStore::new(pool)))
}

/// Build the provider client.
pub(crate) fn kore_client(
    config: KoreConfig,
    credentials: KoreCredentials,
) -> CliResult<Arc<dyn ProvisioningApi>> {
    let client = KoreClient::new(config, credentials)?;
    Ok(Arc::new(client))
}
