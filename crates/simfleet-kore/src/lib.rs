//! # Kore Provisioning Client
//!
//! Authenticated client for the Kore Wireless connectivity API.
//!
//! Covers the three calls simfleet needs:
//!
//! - submitting an activate / deactivate provisioning request,
//! - polling the status of a submitted request,
//! - listing the account's subscriptions for device sync.
//!
//! Access tokens are fetched with the client-credentials grant and cached in
//! a [`TokenCache`] until shortly before they expire. A `401` from the API
//! drops the cached token so the next call fetches a fresh one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use simfleet_kore::{KoreClient, KoreConfig, KoreCredentials, ProvisioningAction};
//!
//! let config = KoreConfig::new(base_url, token_url, "acct-1");
//! let client = KoreClient::new(config, credentials)?;
//!
//! let request_id = client
//!     .submit(ProvisioningAction::Deactivate, &SubscriptionRef::new("sub-001"))
//!     .await?;
//! let report = client.request_status(&request_id).await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod traits;

pub use auth::{KoreCredentials, TokenCache};
pub use client::KoreClient;
pub use config::KoreConfig;
pub use error::{KoreError, KoreResult};
pub use models::{
    ProviderRequestStatus, ProvisioningAction, RequestStatusReport, RequestType, Subscription,
    SubscriptionRef,
};
pub use retry::RetryPolicy;
pub use traits::ProvisioningApi;
