//! Postgres device store integration tests.
//!
//! Run with: `cargo test -p simfleet-db -- --ignored`

mod common;

use common::{cleanup, new_device, setup_pool, unique_id};
use simfleet_db::{
    DevicePatch, DeviceState, DeviceStore, PgDeviceStore, SyncOutcome, UpdateOutcome,
};

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn test_begin_and_settle_round() {
    let pool = setup_pool().await;
    let store = PgDeviceStore::new(pool.clone());
    let sub = unique_id("sub");

    assert_eq!(
        store
            .upsert_synced(&new_device(&sub, DeviceState::Active))
            .await
            .unwrap(),
        SyncOutcome::Inserted
    );

    let begin = DevicePatch::BeginProcessing {
        request_id: "req-42".to_string(),
        intended_state: DeviceState::Deactivated,
    };
    let applied = store.update(&sub, &begin).await.unwrap();
    assert!(applied.is_applied());

    // Second request while Processing must not apply.
    let second = store.update(&sub, &begin).await.unwrap();
    assert!(matches!(second, UpdateOutcome::Conflict(Some(_))));

    let settle = DevicePatch::Settle {
        request_id: "req-42".to_string(),
        state: DeviceState::Deactivated,
    };
    let UpdateOutcome::Applied(record) = store.update(&sub, &settle).await.unwrap() else {
        panic!("settle should apply");
    };
    assert_eq!(record.state, DeviceState::Deactivated);
    assert!(record.provisioning_request_id.is_none());
    assert!(record.intended_state.is_none());

    cleanup(&pool, &sub).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn test_concurrent_begin_has_single_winner() {
    let pool = setup_pool().await;
    let store = std::sync::Arc::new(PgDeviceStore::new(pool.clone()));
    let sub = unique_id("sub");
    store
        .upsert_synced(&new_device(&sub, DeviceState::Active))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let sub = sub.clone();
        handles.push(tokio::spawn(async move {
            let patch = DevicePatch::BeginProcessing {
                request_id: format!("req-{i}"),
                intended_state: DeviceState::Deactivated,
            };
            store.update(&sub, &patch).await.unwrap().is_applied()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let record = store.get(&sub).await.unwrap().unwrap();
    assert!(record.is_consistent());

    cleanup(&pool, &sub).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn test_sync_skips_processing_device() {
    let pool = setup_pool().await;
    let store = PgDeviceStore::new(pool.clone());
    let sub = unique_id("sub");

    store
        .upsert_synced(&new_device(&sub, DeviceState::Active))
        .await
        .unwrap();
    store
        .update(
            &sub,
            &DevicePatch::BeginProcessing {
                request_id: "req-1".to_string(),
                intended_state: DeviceState::Deactivated,
            },
        )
        .await
        .unwrap();

    let outcome = store
        .upsert_synced(&new_device(&sub, DeviceState::Stock))
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::SkippedProcessing);

    let record = store.get(&sub).await.unwrap().unwrap();
    assert_eq!(record.state, DeviceState::Processing);

    let found = store.find_by_iccid(&record.iccid).await.unwrap().unwrap();
    assert_eq!(found.subscription_id, sub);

    cleanup(&pool, &sub).await;
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn test_sync_keeps_stored_iccid() {
    let pool = setup_pool().await;
    let store = PgDeviceStore::new(pool.clone());
    let sub = unique_id("sub");

    let original = new_device(&sub, DeviceState::Active);
    store.upsert_synced(&original).await.unwrap();

    let mut moved = new_device(&sub, DeviceState::Suspend);
    moved.iccid = format!("other-{sub}");
    let err = store.upsert_synced(&moved).await.unwrap_err();
    assert!(err.is_iccid_mismatch());

    let record = store.get(&sub).await.unwrap().unwrap();
    assert_eq!(record.iccid, original.iccid);
    assert_eq!(record.state, DeviceState::Active);

    cleanup(&pool, &sub).await;
}
