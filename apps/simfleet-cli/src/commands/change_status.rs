//! Request a device state change

use clap::Args;
use simfleet_provisioning::{StatusChangeInitiator, TargetState};

use super::{connect_store, kore_client};
use crate::config::AppConfig;
use crate::error::CliResult;
use crate::output::{print_info, print_success};

/// Submit an activation or deactivation request for one device
#[derive(Args, Debug)]
pub struct ChangeStatusArgs {
    /// Subscription ID of the device
    pub subscription_id: String,

    /// Target state: activate or deactivate
    #[arg(value_parser = parse_target)]
    pub target: TargetState,

    /// IMEI to bind on activation (defaults to the stored IMEI)
    #[arg(long)]
    pub imei: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_target(value: &str) -> Result<TargetState, String> {
    value.parse::<TargetState>()
}

/// Execute the change-status command
pub async fn execute(args: ChangeStatusArgs, config: AppConfig) -> CliResult<()> {
    let api = kore_client(config.kore, config.kore_credentials)?;
    let store = connect_store(&config.database_url, config.database_max_connections).await?;

    let accepted = StatusChangeInitiator::new(api, store)
        .request_state_change(&args.subscription_id, args.target, args.imei)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&accepted)?);
        return Ok(());
    }

    print_success(&format!(
        "Request {} accepted for {} (target: {})",
        accepted.request_id, accepted.subscription_id, accepted.intended_state
    ));
    print_info(&format!(
        "Device is Processing. Run 'simfleet reconcile {}' to check completion.",
        accepted.subscription_id
    ));

    Ok(())
}
