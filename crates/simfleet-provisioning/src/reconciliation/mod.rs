//! # Reconciliation Engine
//!
//! Converges devices left in `Processing` by a status change once the
//! provider reports the provisioning request as done.
//!
//! ## Per-device flow
//!
//! ```text
//!   get(subscription_id)
//!        │
//!        ├─ missing ──────────────────────────► NotFound
//!        ├─ not Processing ───────────────────► NotProcessing
//!        ▼
//!   request_status(request_id)  (bounded by a timeout)
//!        │
//!        ├─ error / timeout ──────────────────► ProviderError
//!        ├─ submitted | pending ──────────────► StillProcessing
//!        ├─ other status ─────────────────────► UnexpectedStatus
//!        ▼
//!   completed → terminal state from request type
//!        │
//!        ├─ unknown request type ─────────────► UnexpectedStatus
//!        ▼
//!   update(Settle { request_id, state })
//!        ├─ applied ──────────────────────────► Converged
//!        ├─ conflict ─────────────────────────► NotProcessing / NotFound
//!        └─ store error ──────────────────────► PersistenceFailed
//! ```
//!
//! Only `Converged` changes the record. Everything else leaves the device in
//! `Processing` with its request id, so the next pass picks it up again.
//!
//! The engine never selects devices on its own: callers pass the
//! subscription ids to reconcile, and get back one result per id, in order.

mod engine;
mod report;
mod types;

pub use engine::{derive_terminal_state, ReconciliationConfig, ReconciliationEngine};
pub use report::{ReconciliationReport, ReconciliationSummary};
pub use types::{DeviceReconciliation, ReconcileOutcome};
