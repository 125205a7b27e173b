//! Batch reconciliation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{DeviceReconciliation, ReconcileOutcome};

/// Results of one `reconcile` call, one entry per selected device in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub results: Vec<DeviceReconciliation>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ReconciliationReport {
    #[must_use]
    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary {
            total: self.results.len(),
            ..ReconciliationSummary::default()
        };
        for result in &self.results {
            match result.outcome {
                ReconcileOutcome::Converged { .. } => summary.converged += 1,
                ReconcileOutcome::StillProcessing { .. } => summary.still_processing += 1,
                ReconcileOutcome::NotProcessing { .. } | ReconcileOutcome::NotFound => {
                    summary.skipped += 1;
                }
                _ => summary.failed += 1,
            }
        }
        summary
    }

    /// Wall-clock duration of the pass in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Outcome tallies for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total: usize,
    pub converged: usize,
    pub still_processing: usize,
    pub failed: usize,
    pub skipped: usize,
}
