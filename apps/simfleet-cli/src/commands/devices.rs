//! Device inspection commands

use clap::{Args, Subcommand};
use simfleet_db::{DeviceFilter, DeviceRecord, DeviceState, DeviceStore};

use super::connect_store;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{truncate, validate_pagination};

/// Device inspection commands
#[derive(Args, Debug)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommands,
}

#[derive(Subcommand, Debug)]
pub enum DevicesCommands {
    /// List devices, newest first
    List(ListArgs),
    /// Find a device by ICCID
    Search(SearchArgs),
    /// Show one device by subscription ID
    Get(GetArgs),
    /// Count devices per state
    Counts(CountsArgs),
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only devices in this state (e.g. Active, "Suspend With Charge", Processing)
    #[arg(long)]
    pub state: Option<String>,

    /// Maximum number of devices to return
    #[arg(long, default_value = "50")]
    pub limit: i64,

    /// Offset for pagination
    #[arg(long, default_value = "0")]
    pub offset: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// ICCID to look up
    pub iccid: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the get command
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Subscription ID
    pub subscription_id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the counts command
#[derive(Args, Debug)]
pub struct CountsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute devices commands
pub async fn execute(args: DevicesArgs, config: AppConfig) -> CliResult<()> {
    let store = connect_store(&config.database_url, config.database_max_connections).await?;

    match args.command {
        DevicesCommands::List(list_args) => execute_list(store.as_ref(), list_args).await,
        DevicesCommands::Search(search_args) => execute_search(store.as_ref(), search_args).await,
        DevicesCommands::Get(get_args) => execute_get(store.as_ref(), get_args).await,
        DevicesCommands::Counts(counts_args) => execute_counts(store.as_ref(), counts_args).await,
    }
}

async fn execute_list(store: &dyn DeviceStore, args: ListArgs) -> CliResult<()> {
    validate_pagination(args.limit, args.offset)?;

    let state = args
        .state
        .as_deref()
        .map(str::parse::<DeviceState>)
        .transpose()
        .map_err(CliError::Validation)?;

    let devices = store
        .list(&DeviceFilter {
            state,
            limit: args.limit,
            offset: args.offset,
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else if devices.is_empty() {
        println!("No devices found.");
        println!();
        println!("Populate the mirror with: simfleet sync");
    } else {
        print_device_table(&devices);
        println!();
        println!("Showing {} devices (offset {})", devices.len(), args.offset);
    }

    Ok(())
}

async fn execute_search(store: &dyn DeviceStore, args: SearchArgs) -> CliResult<()> {
    let device = store
        .find_by_iccid(&args.iccid)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("no device with ICCID {}", args.iccid)))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&device)?);
    } else {
        print_device_details(&device);
    }
    Ok(())
}

async fn execute_get(store: &dyn DeviceStore, args: GetArgs) -> CliResult<()> {
    let device = store
        .get(&args.subscription_id)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("device {}", args.subscription_id)))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&device)?);
    } else {
        print_device_details(&device);
    }
    Ok(())
}

async fn execute_counts(store: &dyn DeviceStore, args: CountsArgs) -> CliResult<()> {
    let counts = store.count_by_state().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    if counts.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("{:<22} {:>8}", "STATE", "DEVICES");
    println!("{}", "-".repeat(31));
    let mut total = 0;
    for entry in &counts {
        println!("{:<22} {:>8}", entry.state.as_str(), entry.count);
        total += entry.count;
    }
    println!("{}", "-".repeat(31));
    println!("{:<22} {:>8}", "TOTAL", total);

    Ok(())
}

fn print_device_table(devices: &[DeviceRecord]) {
    println!(
        "{:<24} {:<22} {:<20} {:<16} {:<20}",
        "SUBSCRIPTION", "ICCID", "STATE", "MSISDN", "PENDING REQUEST"
    );
    println!("{}", "-".repeat(106));

    for device in devices {
        println!(
            "{:<24} {:<22} {:<20} {:<16} {:<20}",
            truncate(&device.subscription_id, 24),
            truncate(&device.iccid, 22),
            device.state.as_str(),
            device.msisdn.as_deref().unwrap_or("-"),
            truncate(device.provisioning_request_id.as_deref().unwrap_or("-"), 20),
        );
    }
}

fn print_device_details(device: &DeviceRecord) {
    println!("Device Details");
    println!("{}", "━".repeat(50));
    println!("Subscription:      {}", device.subscription_id);
    println!("ICCID:             {}", device.iccid);
    println!("State:             {}", device.state);
    if let Some(request_id) = &device.provisioning_request_id {
        println!("Pending request:   {}", request_id);
    }
    if let Some(intended) = device.intended_state {
        println!("Requested state:   {}", intended);
    }
    println!("MSISDN:            {}", device.msisdn.as_deref().unwrap_or("-"));
    println!("IMSI:              {}", device.imsi.as_deref().unwrap_or("-"));
    println!("IMEI:              {}", device.imei.as_deref().unwrap_or("-"));
    println!(
        "Created:           {}",
        device.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Updated:           {}",
        device.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
