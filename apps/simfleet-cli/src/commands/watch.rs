//! Periodic reconciliation until interrupted

use std::sync::Arc;

use clap::Args;
use simfleet_provisioning::{ReconciliationEngine, ReconciliationWorker};
use tokio::signal;

use super::{connect_store, kore_client};
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Reconcile every Processing device on an interval
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between passes (overrides RECONCILE_INTERVAL_SECS)
    #[arg(long)]
    pub interval_secs: Option<u64>,
}

/// Execute the watch command
pub async fn execute(args: WatchArgs, config: AppConfig) -> CliResult<()> {
    let mut worker_config = config.worker;
    if let Some(interval_secs) = args.interval_secs {
        if interval_secs == 0 {
            return Err(CliError::Validation(
                "--interval-secs must be at least 1".to_string(),
            ));
        }
        worker_config.interval_secs = interval_secs;
    }

    let api = kore_client(config.kore, config.kore_credentials)?;
    let store = connect_store(&config.database_url, config.database_max_connections).await?;

    let engine = Arc::new(ReconciliationEngine::new(
        api,
        Arc::clone(&store),
        config.reconciliation,
    ));
    let worker = Arc::new(ReconciliationWorker::new(engine, store, worker_config.clone()));

    println!(
        "Reconciling Processing devices every {}s. Press Ctrl+C to stop.",
        worker_config.interval_secs
    );

    let runner = Arc::clone(&worker);
    let handle = tokio::spawn(async move { runner.run().await });

    signal::ctrl_c().await?;
    println!();
    println!("Stopping after the current pass...");
    worker.shutdown();

    if let Err(e) = handle.await {
        return Err(CliError::Io(std::io::Error::other(e)));
    }
    Ok(())
}
