//! Provider seam used by the provisioning workflow.

use async_trait::async_trait;

use crate::error::KoreResult;
use crate::models::{ProvisioningAction, RequestStatusReport, Subscription, SubscriptionRef};

/// Remote provisioning operations against the configured account.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Submit a provisioning request and return its request id.
    async fn submit(
        &self,
        action: ProvisioningAction,
        subscription: &SubscriptionRef,
    ) -> KoreResult<String>;

    /// Fetch the current status of a provisioning request.
    async fn request_status(&self, request_id: &str) -> KoreResult<RequestStatusReport>;

    /// List every subscription on the account.
    async fn list_subscriptions(&self) -> KoreResult<Vec<Subscription>>;
}
