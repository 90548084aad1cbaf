//! Background sync through `AssetApi`, in memory and on disk.

mod common;

use assetgraph::{AssetError, Envelope, Pagination};
use common::{bytes, deployment, disk_api, memory_api, pod, resource_id};
use serde_json::{json, Value};

#[tokio::test]
async fn malformed_element_does_not_block_the_rest() {
    let api = memory_api();
    let p1 = pod("p1", json!({"app": "checkout"}));
    let p2 = json!({"metadata": ["not", "an", "object"]});

    let accepted = api
        .sync_entities(None, "pod", &bytes(&json!([p1, p2])))
        .unwrap();
    assert_eq!(accepted.accepted, 2);
    let ack = serde_json::to_value(&accepted).unwrap();
    assert!(ack.get("uid").is_none());

    api.wait_for_sync().await;

    let result = api.run_query("objtype = pod", Pagination::default()).unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.entities[0].get_str("name"), Some("p1"));

    let stats = api.sync_stats()["pod"];
    assert_eq!(stats.entities_synced, 1);
    assert_eq!(stats.entities_failed, 1);
}

#[tokio::test]
async fn non_array_payload_is_rejected_before_acceptance() {
    let api = memory_api();
    let err = api
        .sync_entities(None, "pod", &bytes(&pod("p1", json!({}))))
        .unwrap_err();
    assert!(matches!(err, AssetError::Decode(_)));
    assert_eq!(Envelope::error(&err).status, 400);
    assert!(api.sync_stats().is_empty());
}

#[tokio::test]
async fn resync_updates_existing_entities_in_place() {
    let api = memory_api();
    let first: Value = json!([deployment("cart", 1), deployment("shop", 2)]);
    api.sync_entities(None, "deployment", &bytes(&first)).unwrap();
    api.wait_for_sync().await;

    let second: Value = json!([deployment("cart", 4)]);
    api.sync_entities(None, "deployment", &bytes(&second)).unwrap();
    api.wait_for_sync().await;

    let result = api
        .run_query("objtype = deployment", Pagination::default())
        .unwrap();
    assert_eq!(result.count, 2);
    let cart = result
        .entities
        .iter()
        .find(|e| e.get_str("name") == Some("cart"))
        .unwrap();
    assert_eq!(cart.get("numReplicas"), Some(&json!(4)));
}

#[tokio::test]
async fn concurrent_batches_all_drain() {
    let api = memory_api();
    for batch in 0..4 {
        let pods: Vec<Value> = (0..5)
            .map(|i| pod(&format!("b{}-p{}", batch, i), json!({"app": "load"})))
            .collect();
        api.sync_entities(None, "pod", &bytes(&Value::Array(pods)))
            .unwrap();
    }
    api.wait_for_sync().await;

    let result = api
        .run_query("application = load", Pagination::new(0, 0))
        .unwrap();
    assert_eq!(result.count, 20);
    assert!(result.entities.is_empty());
    assert_eq!(api.sync_stats()["pod"].batches_completed, 4);
}

#[tokio::test]
async fn synced_entities_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.db");

    {
        let api = disk_api(&path);
        api.sync_entities(None, "pod", &bytes(&json!([pod("p1", json!({}))])))
            .unwrap();
        api.wait_for_sync().await;
    }

    let api = disk_api(&path);
    let deleted = api.delete_entity("pod", &resource_id("pod", "p1")).unwrap();
    assert!(api.get_entity(deleted.uid.as_str()).unwrap().is_none());
}
