//! Common test utilities for assetgraph integration tests
//!
//! Builders for raw cluster payloads and a helper for opening an API over
//! a fresh store.

#![allow(dead_code)]

use assetgraph::{AssetApi, AssetConfig};
use serde_json::{json, Value};
use std::path::Path;

pub const CLUSTER: &str = "prod-eu";

/// API over an in-memory store with default configuration.
pub fn memory_api() -> AssetApi {
    AssetApi::open_in_memory(&test_config()).expect("in-memory api")
}

/// API over an on-disk database at `path`.
pub fn disk_api(path: &Path) -> AssetApi {
    let mut config = test_config();
    config.database = path.to_path_buf();
    AssetApi::open(&config).expect("on-disk api")
}

pub fn test_config() -> AssetConfig {
    AssetConfig {
        cluster: CLUSTER.to_string(),
        ..AssetConfig::default()
    }
}

pub fn bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("serializable fixture")
}

/// A running pod owned by a replica set.
pub fn pod(name: &str, labels: Value) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": "shop",
            "creationTimestamp": "2024-03-01T10:00:00Z",
            "resourceVersion": "4711",
            "labels": labels,
            "annotations": {"assetId": "A-100"},
            "ownerReferences": [
                {"apiVersion": "apps/v1", "kind": "ReplicaSet", "name": format!("{}-rs", name), "uid": "rs-1"}
            ]
        },
        "spec": {"nodeName": "node-a", "containers": [{"name": "main", "image": "shop/app:1"}]},
        "status": {"phase": "Running", "podIP": "10.0.0.7"}
    })
}

pub fn deployment(name: &str, replicas: i64) -> Value {
    json!({
        "metadata": {
            "name": name,
            "namespace": "shop",
            "labels": {"app": name}
        },
        "spec": {"replicas": replicas, "strategy": {"type": "RollingUpdate"}},
        "status": {"availableReplicas": replicas}
    })
}

pub fn resource_id(kind: &str, name: &str) -> String {
    format!("{}:{}:shop:{}", kind, CLUSTER, name)
}
