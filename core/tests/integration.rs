//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the shipped
//! `ReqwestExecutor` transport through the client and the sync service over
//! real HTTP. Validates that request building, response parsing, and the
//! revision protocol hold up against the actual server.

use std::sync::Arc;

use todo_sync::{
    ApiClient, Importance, Item, ReqwestExecutor, SyncConfig, SyncError, SyncService,
};

const TOKEN: &str = "integration-token";

/// Start the mock server on a random port and return its base URL.
async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        mock_server::run(listener).await.unwrap();
    });
    format!("http://{addr}")
}

fn executor() -> Arc<ReqwestExecutor> {
    Arc::new(ReqwestExecutor::new().unwrap())
}

#[tokio::test]
async fn sync_service_lifecycle() {
    let base_url = spawn_server().await;
    let executor = executor();
    let config = SyncConfig::new(&base_url, TOKEN);
    let device_id = config.device_id.clone();
    let service = SyncService::new(config, executor.clone());

    // Step 1: initial refresh against an empty server.
    service.refresh().await.unwrap();
    assert!(service.items().is_empty());
    assert_eq!(service.revision(), 0);

    // Step 2: add an item and push it.
    let item = Item::new("Integration test").with_importance(Importance::High);
    let id = item.id.clone();
    service.add_item(item);
    service.sync().await.unwrap();
    assert_eq!(service.revision(), 1);

    let synced = service.item(&id).unwrap();
    assert_eq!(synced.text, "Integration test");
    assert!(!synced.is_done);

    // Step 3: toggle completion and push again.
    assert!(service.toggle_item(&id));
    service.sync().await.unwrap();
    assert_eq!(service.revision(), 2);
    assert!(service.item(&id).unwrap().is_done);

    // Step 4: the server copy carries this device's id.
    let client = ApiClient::new(&base_url, TOKEN, executor.clone());
    let (remote, revision) = client.fetch_list().await.unwrap();
    assert_eq!(revision, 2);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].last_updated_by, device_id);
    assert!(remote[0].done);

    // Step 5: removing the last item leaves nothing valid to push, and the
    // batch endpoint is never called for an empty snapshot.
    service.remove_item(&id).unwrap();
    let err = service.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::NothingToPush));
    assert_eq!(
        service.status().last_error.as_deref(),
        Some("nothing valid to sync")
    );
    let (remote, _) = client.fetch_list().await.unwrap();
    assert_eq!(remote.len(), 1, "server copy must survive an empty push");

    // Step 6: the next non-empty push replaces the whole server list.
    let replacement = Item::new("Replacement");
    let replacement_id = replacement.id.clone();
    service.add_item(replacement);
    service.sync().await.unwrap();
    assert_eq!(service.revision(), 3);

    let (remote, _) = client.fetch_list().await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].id, replacement_id);

    service.shutdown().await;
}

#[tokio::test]
async fn background_worker_pushes_after_mutation() {
    let base_url = spawn_server().await;
    let service = SyncService::new(SyncConfig::new(&base_url, TOKEN), executor());

    let mut status_rx = service.subscribe_status();
    service.add_item(Item::new("Background push"));

    // The worker owns this push; wait for its cycle to finish.
    let wait = async {
        loop {
            status_rx.changed().await.unwrap();
            let done = {
                let status = status_rx.borrow();
                !status.is_syncing
            };
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(5), wait)
        .await
        .expect("worker never finished a cycle");

    assert_eq!(service.revision(), 1);
    assert_eq!(service.status().last_error, None);

    service.shutdown().await;
}

#[tokio::test]
async fn element_endpoints_lifecycle() {
    let base_url = spawn_server().await;
    let client = ApiClient::new(&base_url, TOKEN, executor());

    // Step 1: add a single element.
    let item = Item::new("Single element").with_importance(Importance::Low);
    let dto = item.to_dto("device-elements");
    let (added, revision) = client.add_item(&dto).await.unwrap();
    assert_eq!(added.id, item.id);
    assert_eq!(revision, 1);

    // Step 2: fetch it back.
    let (fetched, _) = client.fetch_item(&item.id).await.unwrap();
    assert_eq!(fetched, added);

    // Step 3: replace it with a completed copy.
    let changed = item.copy_with(Some(true));
    let (updated, revision) = client
        .update_item(&changed.to_dto("device-elements"))
        .await
        .unwrap();
    assert!(updated.done);
    assert_eq!(revision, 2);

    // Step 4: delete it; the server returns the removed element.
    let (deleted, revision) = client.delete_item(&item.id).await.unwrap();
    assert_eq!(deleted.id, item.id);
    assert_eq!(revision, 3);

    // Step 5: the id is now unknown.
    let err = client.fetch_item(&item.id).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let base_url = spawn_server().await;
    let client = ApiClient::new(&base_url, "", executor());

    let err = client.fetch_list().await.unwrap_err();
    match err {
        SyncError::BadResponse(msg) => {
            assert!(msg.contains("401"), "unexpected message: {msg}");
        }
        other => panic!("expected BadResponse, got {other:?}"),
    }
}
