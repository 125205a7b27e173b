//! Database entity models for simfleet-db.

pub mod device;
