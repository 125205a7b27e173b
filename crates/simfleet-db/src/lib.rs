//! # Device Record Store
//!
//! Persistent mirror of the SIM devices managed through the Kore
//! connectivity provider.
//!
//! Each record links a device (ICCID / subscription id) to its current
//! provider state and, while a provisioning request is outstanding, to the
//! request id and the state the operator asked for.
//!
//! ## Invariants
//!
//! - `provisioning_request_id` is set if and only if `state == Processing`.
//! - `intended_state` is set only while `state == Processing`.
//!
//! Writers never touch those columns directly. They submit a typed
//! [`DevicePatch`] and the store applies it as a conditional update, so two
//! operator sessions racing on the same device cannot both win.
//!
//! ## Example
//!
//! ```rust,ignore
//! use simfleet_db::{DbPool, DeviceStore, PgDeviceStore, DeviceState};
//!
//! let pool = DbPool::connect("postgres://localhost/simfleet").await?;
//! simfleet_db::run_migrations(&pool).await?;
//!
//! let store = PgDeviceStore::new(pool);
//! let pending = store.list_by_state(DeviceState::Processing).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod store;

pub use error::{DbError, DbResult};
pub use migrations::run_migrations;
pub use models::device::{
    DeviceFilter, DevicePatch, DeviceRecord, DeviceState, NewDevice, StateCount,
};
pub use pool::DbPool;
pub use store::memory::InMemoryDeviceStore;
pub use store::postgres::PgDeviceStore;
pub use store::{DeviceStore, SyncOutcome, UpdateOutcome};
