//! simfleet - operator console for Kore SIM provisioning
//!
//! - Sync the device mirror from the provider
//! - List, search, and count devices
//! - Request activation / deactivation
//! - Reconcile devices waiting on a provisioning request, once or on a timer

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod error;
mod logging;
mod output;

use config::AppConfig;
use error::CliResult;

/// simfleet - SIM fleet provisioning console
#[derive(Parser)]
#[command(name = "simfleet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Refresh the device mirror from the provider's subscription list
    Sync(commands::sync::SyncArgs),

    /// Inspect devices
    Devices(commands::devices::DevicesArgs),

    /// Request activation or deactivation of a device
    ChangeStatus(commands::change_status::ChangeStatusArgs),

    /// Reconcile devices waiting on a provisioning request
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Reconcile every Processing device on an interval until interrupted
    Watch(commands::watch::WatchArgs),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_logging(
        logging::DEFAULT_FILTER,
        logging::json_requested(std::env::var("SIMFLEET_LOG_FORMAT").ok().as_deref()),
    );

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = AppConfig::from_env()?;
    tracing::debug!(account_id = %config.kore.account_id, "Configuration loaded");

    match cli.command {
        Commands::Migrate => commands::migrate::execute(config).await,
        Commands::Sync(args) => commands::sync::execute(args, config).await,
        Commands::Devices(args) => commands::devices::execute(args, config).await,
        Commands::ChangeStatus(args) => commands::change_status::execute(args, config).await,
        Commands::Reconcile(args) => commands::reconcile::execute(args, config).await,
        Commands::Watch(args) => commands::watch::execute(args, config).await,
    }
}
