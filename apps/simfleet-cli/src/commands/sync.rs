//! Refresh the device mirror from the provider

use clap::Args;
use simfleet_provisioning::DeviceSync;

use super::{connect_store, kore_client};
use crate::config::AppConfig;
use crate::error::CliResult;
use crate::output::{print_success, print_warning};

/// Pull every subscription from the provider into the local store
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, config: AppConfig) -> CliResult<()> {
    let api = kore_client(config.kore, config.kore_credentials)?;
    let store = connect_store(&config.database_url, config.database_max_connections).await?;

    let report = DeviceSync::new(api, store).run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_success(&format!(
        "Synced {} subscriptions: {} new, {} updated, {} left processing",
        report.total(),
        report.inserted,
        report.updated,
        report.skipped_processing
    ));
    for (subscription_id, reason) in &report.rejected {
        print_warning(&format!("{subscription_id}: {reason}"));
    }

    Ok(())
}
