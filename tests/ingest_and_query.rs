//! End-to-end ingestion and query through `AssetApi`.

mod common;

use assetgraph::{AssetError, CompileError, Envelope, Pagination};
use common::{bytes, deployment, memory_api, pod, resource_id, CLUSTER};
use serde_json::json;

#[test]
fn created_pod_is_found_by_application() {
    let api = memory_api();
    let created = api
        .create_entity(None, "pod", &bytes(&pod("checkout-1", json!({"app": "checkout"}))))
        .unwrap();

    let result = api
        .run_query(
            r#"objtype = pod AND application contains "checkout""#,
            Pagination::new(0, 10),
        )
        .unwrap();

    assert_eq!(result.count, 1);
    assert_eq!(result.entities.len(), 1);
    let entity = &result.entities[0];
    assert_eq!(entity.uid(), Some(created.uid));
    assert_eq!(entity.get_str("objtype"), Some("pod"));
    assert_eq!(entity.get_str("name"), Some("checkout-1"));
    assert_eq!(entity.get_str("cluster"), Some(CLUSTER));
    assert_eq!(entity.get_str("namespace"), Some("shop"));
    assert_eq!(entity.get("application"), Some(&json!(["checkout"])));
    assert_eq!(entity.get_str("asset"), Some("A-100"));
    assert_eq!(entity.get_str("owner"), Some("checkout-1-rs"));
    assert_eq!(entity.get_str("ownerType"), Some("replicaset"));
    assert_eq!(entity.get_str("phase"), Some("Running"));
    assert_eq!(entity.get_str("k8sobj"), Some("K8sObj"));
    assert_eq!(
        entity.get_str("resourceid"),
        Some(resource_id("pod", "checkout-1").as_str())
    );
}

#[test]
fn empty_store_returns_empty_result() {
    let api = memory_api();
    for filter in ["objtype = pod", "name startswith web or not owner exists"] {
        let result = api.run_query(filter, Pagination::default()).unwrap();
        assert_eq!(result.count, 0, "{}", filter);
        assert!(result.entities.is_empty());
    }
}

#[test]
fn limit_bounds_page_but_not_count() {
    let api = memory_api();
    for i in 0..12 {
        api.create_entity(None, "deployment", &bytes(&deployment(&format!("svc-{}", i), 2)))
            .unwrap();
    }

    let result = api
        .run_query("objtype = deployment", Pagination::new(0, 5))
        .unwrap();
    assert_eq!(result.count, 12);
    assert_eq!(result.entities.len(), 5);

    let tail = api
        .run_query("objtype = deployment", Pagination::new(10, 5))
        .unwrap();
    assert_eq!(tail.count, 12);
    assert_eq!(tail.entities.len(), 2);
}

#[test]
fn typed_predicates_enable_numeric_filters() {
    let api = memory_api();
    api.upsert_schema(&bytes(&json!({"name": "numReplicas", "type": "int", "index": true})))
        .unwrap();
    api.create_entity(None, "deployment", &bytes(&deployment("small", 1)))
        .unwrap();
    api.create_entity(None, "deployment", &bytes(&deployment("large", 5)))
        .unwrap();

    let result = api
        .run_query("objtype = deployment and numReplicas >= 3", Pagination::default())
        .unwrap();
    assert_eq!(result.count, 1);
    assert_eq!(result.entities[0].get_str("name"), Some("large"));
}

#[test]
fn dropped_predicate_is_a_compile_error() {
    let api = memory_api();
    api.upsert_schema(&bytes(&json!({"name": "phase", "type": "string", "index": true})))
        .unwrap();
    api.run_query("phase = Running", Pagination::default())
        .unwrap();

    assert_eq!(api.drop_schema("phase").unwrap(), "phase");
    let err = api
        .run_query("phase = Running", Pagination::default())
        .unwrap_err();
    assert!(matches!(
        err,
        AssetError::Compile(CompileError::UnknownField(ref f)) if f == "phase"
    ));
    assert_eq!(Envelope::error(&err).status, 400);
}

#[test]
fn update_twice_equals_update_once() {
    let api = memory_api();
    let created = api
        .create_entity(None, "pod", &bytes(&pod("web-1", json!({"app": "web"}))))
        .unwrap();
    let partial = bytes(&json!({"labels": {"app": "x"}}));

    api.update_entity("pod", created.uid.as_str(), &partial).unwrap();
    let once = api.get_entity(created.uid.as_str()).unwrap().unwrap();
    api.update_entity("pod", created.uid.as_str(), &partial).unwrap();
    let twice = api.get_entity(created.uid.as_str()).unwrap().unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.get("labels"), Some(&json!({"app": "x"})));
}

#[test]
fn delete_then_get_is_empty_not_error() {
    let api = memory_api();
    let created = api
        .create_entity(None, "pod", &bytes(&pod("web-1", json!({}))))
        .unwrap();
    let deleted = api
        .delete_entity("pod", &resource_id("pod", "web-1"))
        .unwrap();
    assert_eq!(deleted.uid, created.uid);

    assert!(api.get_entity(created.uid.as_str()).unwrap().is_none());
    let again = api.delete_entity("pod", &resource_id("pod", "web-1"));
    assert_eq!(Envelope::from_result(&again).status, 404);
}

#[test]
fn malformed_payloads_are_decode_errors() {
    let api = memory_api();
    let payloads: [&[u8]; 3] = [
        b"{not json",
        br#"{"spec": {}}"#,
        br#"[{"metadata": {"name": "a"}}]"#,
    ];
    for payload in payloads {
        let err = api.create_entity(None, "pod", payload).unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)), "{:?}", err);
        assert_eq!(err.status_code(), 400);
    }
}

#[test]
fn pass_through_kind_is_stored_verbatim() {
    let api = memory_api();
    let created = api
        .create_entity(
            Some("lab"),
            "virtualmachine",
            br#"{"name": "vm-1", "cluster": "lab", "cpu": 8}"#,
        )
        .unwrap();
    let entity = api.get_entity(created.uid.as_str()).unwrap().unwrap();
    assert_eq!(entity.get("cpu"), Some(&json!(8)));
    assert_eq!(entity.get_str("objtype"), Some("virtualmachine"));
    assert!(entity.get("k8sobj").is_none());
}
