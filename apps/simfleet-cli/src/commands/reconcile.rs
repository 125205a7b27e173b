//! Reconcile devices waiting on a provisioning request

use clap::Args;
use simfleet_db::DeviceState;
use simfleet_provisioning::{DeviceReconciliation, ReconciliationEngine, ReconciliationReport};

use super::{connect_store, kore_client};
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{print_info, truncate};

/// Poll the provider for the selected devices and settle completed requests
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Subscription IDs to reconcile
    #[arg(conflicts_with = "all_processing")]
    pub subscription_ids: Vec<String>,

    /// Reconcile every device currently in Processing
    #[arg(long)]
    pub all_processing: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the reconcile command
///
/// Per-device failures are reported, not raised: the command succeeds as
/// long as the pass itself ran.
pub async fn execute(args: ReconcileArgs, config: AppConfig) -> CliResult<()> {
    if args.subscription_ids.is_empty() && !args.all_processing {
        return Err(CliError::Validation(
            "Pass one or more subscription IDs, or --all-processing.".to_string(),
        ));
    }

    let api = kore_client(config.kore, config.kore_credentials)?;
    let store = connect_store(&config.database_url, config.database_max_connections).await?;

    let ids = if args.all_processing {
        store
            .list_by_state(DeviceState::Processing)
            .await?
            .into_iter()
            .map(|device| device.subscription_id)
            .collect()
    } else {
        args.subscription_ids
    };

    let engine = ReconciliationEngine::new(api, store, config.reconciliation);
    let report = engine.reconcile(&ids).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_empty() {
        print_info("No devices are waiting on a provisioning request.");
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &ReconciliationReport) {
    println!(
        "{:<24} {:<20} {:<18} {}",
        "SUBSCRIPTION", "REQUEST", "OUTCOME", "DETAIL"
    );
    println!("{}", "-".repeat(96));
    for result in &report.results {
        print_result(result);
    }

    let summary = report.summary();
    println!();
    println!(
        "{} devices: {} converged, {} still processing, {} failed, {} skipped ({} ms)",
        summary.total,
        summary.converged,
        summary.still_processing,
        summary.failed,
        summary.skipped,
        report.duration_ms()
    );
}

fn print_result(result: &DeviceReconciliation) {
    println!(
        "{:<24} {:<20} {:<18} {}",
        truncate(&result.subscription_id, 24),
        truncate(result.request_id.as_deref().unwrap_or("-"), 20),
        result.outcome.label(),
        result.outcome.detail()
    );
}
