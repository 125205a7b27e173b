//! Shared test doubles for the provisioning workflow tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use simfleet_db::{
    DbError, DbResult, DeviceFilter, DevicePatch, DeviceRecord, DeviceState, DeviceStore,
    InMemoryDeviceStore, NewDevice, StateCount, SyncOutcome, UpdateOutcome,
};
use simfleet_kore::{
    KoreError, KoreResult, ProvisioningAction, ProvisioningApi, RequestStatusReport, Subscription,
    SubscriptionRef,
};

// =============================================================================
// Mock provider
// =============================================================================

/// How the mock answers a submission.
#[derive(Debug, Clone, Copy)]
pub enum SubmitBehavior {
    Success,
    ServerError,
    ClientError,
    AuthError,
}

/// How the mock answers a status query for one request id.
#[derive(Debug, Clone)]
pub enum StatusBehavior {
    /// Return this JSON payload.
    Payload(serde_json::Value),
    /// Fail with a retryable 503.
    ServerError,
    /// Never answer.
    Hang,
}

/// Manual mock of the Kore API with call counters.
pub struct MockProvider {
    submit_behavior: Mutex<SubmitBehavior>,
    next_request_id: Mutex<Option<String>>,
    statuses: Mutex<HashMap<String, StatusBehavior>>,
    subscriptions: Mutex<Vec<Subscription>>,
    last_submission: Mutex<Option<(ProvisioningAction, SubscriptionRef)>>,
    /// When set, a rival request moves the device to Processing during submit.
    race_store: Mutex<Option<Arc<InMemoryDeviceStore>>>,
    request_counter: AtomicUsize,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            submit_behavior: Mutex::new(SubmitBehavior::Success),
            next_request_id: Mutex::new(None),
            statuses: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            last_submission: Mutex::new(None),
            race_store: Mutex::new(None),
            request_counter: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_submit_behavior(&self, behavior: SubmitBehavior) {
        *self.submit_behavior.lock().unwrap() = behavior;
    }

    pub fn set_next_request_id(&self, id: &str) {
        *self.next_request_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn set_status(&self, request_id: &str, behavior: StatusBehavior) {
        self.statuses
            .lock()
            .unwrap()
            .insert(request_id.to_string(), behavior);
    }

    /// Flat-shape payload `{status, requestType}`.
    pub fn set_status_payload(&self, request_id: &str, status: &str, request_type: &str) {
        self.set_status(
            request_id,
            StatusBehavior::Payload(json!({"status": status, "requestType": request_type})),
        );
    }

    pub fn set_subscriptions(&self, subscriptions: Vec<Subscription>) {
        *self.subscriptions.lock().unwrap() = subscriptions;
    }

    pub fn race_with(&self, store: Arc<InMemoryDeviceStore>) {
        *self.race_store.lock().unwrap() = Some(store);
    }

    pub fn last_submission(&self) -> Option<(ProvisioningAction, SubscriptionRef)> {
        self.last_submission.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProvisioningApi for MockProvider {
    async fn submit(
        &self,
        action: ProvisioningAction,
        subscription: &SubscriptionRef,
    ) -> KoreResult<String> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_submission.lock().unwrap() = Some((action, subscription.clone()));

        let behavior = *self.submit_behavior.lock().unwrap();
        match behavior {
            SubmitBehavior::Success => {}
            SubmitBehavior::ServerError => {
                return Err(KoreError::Http {
                    status: 503,
                    body: "service unavailable".to_string(),
                })
            }
            SubmitBehavior::ClientError => {
                return Err(KoreError::Http {
                    status: 400,
                    body: r#"{"error":"invalid subscription"}"#.to_string(),
                })
            }
            SubmitBehavior::AuthError => {
                return Err(KoreError::Auth("token endpoint returned 401".to_string()))
            }
        }

        let rival = self.race_store.lock().unwrap().clone();
        if let Some(store) = rival {
            let patch = DevicePatch::BeginProcessing {
                request_id: "req-rival".to_string(),
                intended_state: DeviceState::Active,
            };
            store
                .update(&subscription.subscription_id, &patch)
                .await
                .unwrap();
        }

        let fixed = self.next_request_id.lock().unwrap().take();
        Ok(fixed.unwrap_or_else(|| {
            format!("req-{}", self.request_counter.fetch_add(1, Ordering::SeqCst) + 1)
        }))
    }

    async fn request_status(&self, request_id: &str) -> KoreResult<RequestStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.statuses.lock().unwrap().get(request_id).cloned();
        match behavior {
            Some(StatusBehavior::Payload(raw)) => RequestStatusReport::from_payload(raw),
            Some(StatusBehavior::ServerError) => Err(KoreError::Http {
                status: 503,
                body: "upstream unavailable".to_string(),
            }),
            Some(StatusBehavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(KoreError::Timeout("hung".to_string()))
            }
            None => Err(KoreError::Http {
                status: 404,
                body: format!(r#"{{"error":"request {request_id} not found"}}"#),
            }),
        }
    }

    async fn list_subscriptions(&self) -> KoreResult<Vec<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().clone())
    }
}

// =============================================================================
// Store wrapper with injectable failures
// =============================================================================

/// In-memory store whose reads or writes can be made to fail.
pub struct FlakyStore {
    inner: Arc<InMemoryDeviceStore>,
    fail_updates: AtomicBool,
    fail_get_for: Mutex<Vec<String>>,
    update_calls: AtomicUsize,
}

impl FlakyStore {
    #[must_use]
    pub fn new(inner: Arc<InMemoryDeviceStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            fail_get_for: Mutex::new(Vec::new()),
            update_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get_for(&self, subscription_id: &str) {
        self.fail_get_for
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> DbError {
        DbError::ConnectionFailed(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl DeviceStore for FlakyStore {
    async fn get(&self, subscription_id: &str) -> DbResult<Option<DeviceRecord>> {
        let failing = self
            .fail_get_for
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == subscription_id);
        if failing {
            return Err(Self::unavailable());
        }
        self.inner.get(subscription_id).await
    }

    async fn find_by_iccid(&self, iccid: &str) -> DbResult<Option<DeviceRecord>> {
        self.inner.find_by_iccid(iccid).await
    }

    async fn list(&self, filter: &DeviceFilter) -> DbResult<Vec<DeviceRecord>> {
        self.inner.list(filter).await
    }

    async fn list_by_state(&self, state: DeviceState) -> DbResult<Vec<DeviceRecord>> {
        self.inner.list_by_state(state).await
    }

    async fn update(&self, subscription_id: &str, patch: &DevicePatch) -> DbResult<UpdateOutcome> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.update(subscription_id, patch).await
    }

    async fn upsert_synced(&self, device: &NewDevice) -> DbResult<SyncOutcome> {
        self.inner.upsert_synced(device).await
    }

    async fn count_by_state(&self) -> DbResult<Vec<StateCount>> {
        self.inner.count_by_state().await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn device(subscription_id: &str, state: DeviceState) -> DeviceRecord {
    let now = Utc::now();
    DeviceRecord {
        subscription_id: subscription_id.to_string(),
        iccid: format!("8901{subscription_id}"),
        state,
        provisioning_request_id: None,
        intended_state: None,
        msisdn: None,
        imsi: None,
        imei: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn processing_device(
    subscription_id: &str,
    request_id: &str,
    intended: DeviceState,
) -> DeviceRecord {
    DeviceRecord {
        provisioning_request_id: Some(request_id.to_string()),
        intended_state: Some(intended),
        ..device(subscription_id, DeviceState::Processing)
    }
}

/// Fail the test if any record breaks the request-linkage invariants.
pub async fn assert_store_consistent(store: &InMemoryDeviceStore) {
    for record in store.snapshot().await {
        assert!(
            record.is_consistent(),
            "inconsistent record {}: {:?}",
            record.subscription_id,
            record.invariant_violation()
        );
    }
}
