//! Reconciliation Worker
//!
//! Background loop that periodically reconciles every device in `Processing`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simfleet_db::{DeviceState, DeviceStore};
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::error::ProvisioningResult;
use crate::reconciliation::{ReconciliationEngine, ReconciliationReport};

/// Worker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between reconciliation passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    300
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Periodic reconciliation of all `Processing` devices.
///
/// The worker is the component that selects devices; the engine only
/// reconciles what it is given.
pub struct ReconciliationWorker {
    engine: Arc<ReconciliationEngine>,
    store: Arc<dyn DeviceStore>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ReconciliationWorker {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        store: Arc<dyn DeviceStore>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            engine,
            store,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Run one pass over every device currently `Processing`.
    pub async fn run_once(&self) -> ProvisioningResult<ReconciliationReport> {
        let pending = self.store.list_by_state(DeviceState::Processing).await?;
        let ids: Vec<String> = pending.into_iter().map(|d| d.subscription_id).collect();
        Ok(self.engine.reconcile(&ids).await)
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    ///
    /// A pass in flight when shutdown is requested finishes before the loop
    /// exits.
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.interval_secs,
            "Starting reconciliation worker"
        );

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.wake.notified() => {}
            }
            if self.is_shutdown() {
                break;
            }

            if let Err(e) = self.run_once().await {
                error!(error = %e, "Reconciliation pass failed");
            }
        }

        info!("Reconciliation worker stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::Relaxed);
        self.wake.notify_one();
    }

    /// Check if shutdown was requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}
