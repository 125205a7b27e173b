//! # SIM Provisioning Workflow
//!
//! Drives device state changes through the Kore provider and converges the
//! local mirror once the provider reports them done.
//!
//! ## Flow
//!
//! 1. [`StatusChangeInitiator`] submits an activate or deactivate request
//!    and moves the device to `Processing`, recording the request id.
//! 2. [`ReconciliationEngine`] polls the status of each selected
//!    `Processing` device and, once the provider reports `completed`,
//!    settles it in the terminal state implied by the request type.
//! 3. [`ReconciliationWorker`] runs the engine on a timer over every
//!    `Processing` device.
//! 4. [`DeviceSync`] refreshes the mirror from the provider's subscription
//!    list without disturbing devices that are `Processing`.
//!
//! Every store write is a compare-and-set, so concurrent operators and
//! overlapping reconciliation passes cannot leave a device with two
//! outstanding requests or settle it against a stale request.

pub mod error;
pub mod initiator;
pub mod reconciliation;
pub mod sync;
pub mod worker;

pub use error::{ProvisioningError, ProvisioningResult};
pub use initiator::{StateChangeAccepted, StatusChangeInitiator, TargetState};
pub use reconciliation::{
    derive_terminal_state, DeviceReconciliation, ReconcileOutcome, ReconciliationConfig,
    ReconciliationEngine, ReconciliationReport, ReconciliationSummary,
};
pub use sync::{DeviceSync, SyncReport};
pub use worker::{ReconciliationWorker, WorkerConfig};
