//! Entity ingestion: normalized writes against the graph store

use super::sync::SyncTracker;
use crate::entity::{attr, Entity, Uid};
use crate::error::{AssetError, AssetResult};
use crate::normalize::{DecodeError, Kind, NormalizerRegistry};
use crate::storage::GraphStore;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Canonical spelling of a kind name (`Pod` and `pod` are the same kind).
pub fn canonical_kind(kind: &str) -> String {
    Kind::from(kind).to_string()
}

/// Stamp `objtype` and `resourceid` onto an entity bound for `kind`.
fn prepare(kind: &str, mut entity: Entity) -> AssetResult<Entity> {
    let current = entity.objtype().map(str::to_string);
    match current.as_deref() {
        Some(objtype) if objtype == kind => {}
        None => entity.insert(attr::OBJTYPE, kind),
        Some(objtype) if canonical_kind(objtype) == kind => entity.insert(attr::OBJTYPE, kind),
        Some(objtype) => {
            return Err(AssetError::invalid(format!(
                "objtype '{}' does not match kind '{}'",
                objtype, kind
            )))
        }
    }
    if entity.resource_id().is_none() {
        if let Some(rid) = entity.derive_resource_id() {
            entity.insert(attr::RESOURCE_ID, rid);
        }
    }
    Ok(entity)
}

fn parse_object(kind: &str, raw: &[u8]) -> AssetResult<Map<String, Value>> {
    match serde_json::from_slice(raw).map_err(DecodeError::Json)? {
        Value::Object(map) => Ok(map),
        _ => Err(DecodeError::ExpectedObject {
            kind: kind.to_string(),
        }
        .into()),
    }
}

/// Create, update, delete, get and bulk sync of entities.
#[derive(Clone)]
pub struct EntityService {
    registry: Arc<NormalizerRegistry>,
    store: Arc<dyn GraphStore>,
    tracker: Arc<SyncTracker>,
}

impl EntityService {
    pub fn new(registry: Arc<NormalizerRegistry>, store: Arc<dyn GraphStore>) -> Self {
        Self {
            registry,
            store,
            tracker: Arc::new(SyncTracker::new()),
        }
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    /// Write one already-normalized entity.
    pub fn create(&self, kind: &str, entity: Entity) -> AssetResult<Uid> {
        let kind = canonical_kind(kind);
        let entity = prepare(&kind, entity)?;
        let uid = self.store.create(&entity)?;
        tracing::info!(kind = %kind, uid = %uid, "entity created");
        Ok(uid)
    }

    /// Normalize a raw single-object payload and write it.
    pub fn create_raw(&self, cluster: &str, kind: &str, raw: &[u8]) -> AssetResult<Uid> {
        let entity = self
            .registry
            .normalize(cluster, kind, raw, false)?
            .into_one()
            .ok_or_else(|| AssetError::invalid("expected a single object"))?;
        self.create(kind, entity)
    }

    /// Merge `partial` into the entity `uid`.
    ///
    /// `uid` and `objtype` may be repeated with their current values but not
    /// changed. Applying the same partial twice leaves the same state. A
    /// partial that renames the entity (`name`, `namespace`, `cluster`)
    /// without carrying a `resourceid` gets one derived from the merged view.
    pub fn update(&self, kind: &str, uid: &Uid, mut partial: Map<String, Value>) -> AssetResult<Uid> {
        let kind = canonical_kind(kind);
        if let Some(value) = partial.remove(attr::UID) {
            if value.as_str() != Some(uid.as_str()) {
                return Err(AssetError::invalid("uid is immutable"));
            }
        }
        if let Some(value) = partial.remove(attr::OBJTYPE) {
            if value.as_str().map(canonical_kind).as_deref() != Some(kind.as_str()) {
                return Err(AssetError::invalid("objtype is immutable"));
            }
        }

        let current = self
            .store
            .get(uid)?
            .ok_or_else(|| AssetError::NotFound(format!("entity {}", uid)))?;
        if current.objtype() != Some(kind.as_str()) {
            return Err(AssetError::NotFound(format!("{} {}", kind, uid)));
        }

        let renames = [attr::NAME, attr::NAMESPACE, attr::CLUSTER]
            .iter()
            .any(|key| partial.contains_key(*key));
        if renames && !partial.contains_key(attr::RESOURCE_ID) {
            let mut merged = current;
            for (key, value) in &partial {
                merged.insert(key.clone(), value.clone());
            }
            if let Some(rid) = merged.derive_resource_id() {
                partial.insert(attr::RESOURCE_ID.to_string(), Value::String(rid));
            }
        }

        if !self.store.update(uid, &partial)? {
            return Err(AssetError::NotFound(format!("entity {}", uid)));
        }
        tracing::info!(kind = %kind, uid = %uid, fields = partial.len(), "entity updated");
        Ok(uid.clone())
    }

    pub fn update_raw(&self, kind: &str, uid: &Uid, raw: &[u8]) -> AssetResult<Uid> {
        let partial = parse_object(kind, raw)?;
        self.update(kind, uid, partial)
    }

    /// Remove the entity of `kind` with external identity `resource_id`.
    pub fn delete(&self, kind: &str, resource_id: &str) -> AssetResult<Uid> {
        let kind = canonical_kind(kind);
        let not_found = || AssetError::NotFound(format!("{} {}", kind, resource_id));
        let uid = self
            .store
            .find_by_resource_id(&kind, resource_id)?
            .ok_or_else(not_found)?;
        if !self.store.delete(&uid)? {
            return Err(not_found());
        }
        tracing::info!(kind = %kind, resource_id = %resource_id, uid = %uid, "entity deleted");
        Ok(uid)
    }

    /// Absent entities are `Ok(None)`, not an error.
    pub fn get(&self, uid: &Uid) -> AssetResult<Option<Entity>> {
        Ok(self.store.get(uid)?)
    }

    /// Accept a JSON array of raw objects for background upsert.
    ///
    /// Only the array shape is checked before acceptance. Each element is
    /// then normalized and upserted on its own; a bad element is logged and
    /// counted and does not stop the others. Returns the number of elements
    /// accepted. Must be called from within a Tokio runtime.
    pub fn sync(&self, cluster: &str, kind: &str, raw: &[u8]) -> AssetResult<usize> {
        let items = match serde_json::from_slice(raw).map_err(DecodeError::Json)? {
            Value::Array(items) => items,
            _ => {
                return Err(DecodeError::ExpectedList {
                    kind: kind.to_string(),
                }
                .into())
            }
        };
        self.sync_values(cluster, kind, items)
    }

    pub fn sync_values(&self, cluster: &str, kind: &str, items: Vec<Value>) -> AssetResult<usize> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| AssetError::AsyncProcessing(format!("no runtime for sync: {}", e)))?;

        let kind = canonical_kind(kind);
        let accepted = items.len();
        let guard = self.tracker.begin(&kind);
        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let tracker = Arc::clone(&self.tracker);
        let cluster = cluster.to_string();

        tracing::info!(kind = %kind, cluster = %cluster, count = accepted, "sync accepted");

        handle.spawn_blocking(move || {
            let _guard = guard;
            let mut failed = 0usize;
            for (index, item) in items.into_iter().enumerate() {
                let outcome = registry
                    .normalize_value(&cluster, &kind, item)
                    .map_err(AssetError::from)
                    .and_then(|entity| prepare(&kind, entity))
                    .and_then(|entity| Ok(store.upsert(&entity)?));
                match outcome {
                    Ok(uid) => {
                        tracing::debug!(kind = %kind, uid = %uid, "entity synced");
                        tracker.record_synced(&kind);
                    }
                    Err(e) => {
                        let err = AssetError::AsyncProcessing(format!("element {}: {}", index, e));
                        tracing::warn!(kind = %kind, error = %err, "sync element failed");
                        tracker.record_failed(&kind);
                        failed += 1;
                    }
                }
            }
            tracing::info!(
                kind = %kind,
                synced = accepted - failed,
                failed,
                "sync batch finished"
            );
        });

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{OpenStore, SqliteStore};
    use serde_json::json;

    fn service() -> (Arc<SqliteStore>, EntityService) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = EntityService::new(Arc::new(NormalizerRegistry::default()), store.clone());
        (store, svc)
    }

    fn pod_payload(name: &str) -> Value {
        json!({
            "metadata": {
                "name": name,
                "namespace": "shop",
                "labels": {"app": "checkout"}
            },
            "status": {"phase": "Running"}
        })
    }

    fn bytes(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn create_raw_stamps_identity() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "Pod", &bytes(&pod_payload("web-1")))
            .unwrap();
        let entity = svc.get(&uid).unwrap().unwrap();
        assert_eq!(entity.objtype(), Some("pod"));
        assert_eq!(entity.resource_id(), Some("pod:prod:shop:web-1"));
        assert_eq!(entity.uid(), Some(uid));
    }

    #[test]
    fn create_rejects_conflicting_objtype() {
        let (_, svc) = service();
        let entity = Entity::new().with("objtype", "service").with("name", "x");
        assert!(matches!(svc.create("pod", entity), Err(AssetError::Decode(_))));
    }

    #[test]
    fn create_pass_through_sets_objtype() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "vm", br#"{"name": "vm-1", "cpu": 4}"#)
            .unwrap();
        let entity = svc.get(&uid).unwrap().unwrap();
        assert_eq!(entity.objtype(), Some("vm"));
        assert_eq!(entity.get("cpu"), Some(&json!(4)));
    }

    #[test]
    fn update_is_idempotent() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();
        let partial = json!({"labels": {"app": "x"}});

        svc.update_raw("pod", &uid, &bytes(&partial)).unwrap();
        let once = svc.get(&uid).unwrap().unwrap();
        svc.update_raw("pod", &uid, &bytes(&partial)).unwrap();
        let twice = svc.get(&uid).unwrap().unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.get("labels"), Some(&json!({"app": "x"})));
    }

    #[test]
    fn update_guards_immutable_fields() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();

        let same = json!({"uid": uid.as_str(), "objtype": "pod", "ip": "10.1.1.1"});
        assert!(svc.update_raw("pod", &uid, &bytes(&same)).is_ok());

        let other_uid = json!({"uid": "someone-else"});
        assert!(matches!(
            svc.update_raw("pod", &uid, &bytes(&other_uid)),
            Err(AssetError::Decode(_))
        ));
        let other_kind = json!({"objtype": "service"});
        assert!(matches!(
            svc.update_raw("pod", &uid, &bytes(&other_kind)),
            Err(AssetError::Decode(_))
        ));
    }

    #[test]
    fn update_missing_or_wrong_kind_is_not_found() {
        let (_, svc) = service();
        assert!(matches!(
            svc.update("pod", &Uid::from("ghost"), Map::new()),
            Err(AssetError::NotFound(_))
        ));
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();
        assert!(matches!(
            svc.update("service", &uid, Map::new()),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn rename_rederives_resource_id() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();

        let rename = json!({"name": "web-2", "namespace": "edge"});
        svc.update_raw("pod", &uid, &bytes(&rename)).unwrap();
        let entity = svc.get(&uid).unwrap().unwrap();
        assert_eq!(entity.resource_id(), Some("pod:prod:edge:web-2"));

        assert!(matches!(
            svc.delete("pod", "pod:prod:shop:web-1"),
            Err(AssetError::NotFound(_))
        ));
        assert_eq!(svc.delete("pod", "pod:prod:edge:web-2").unwrap(), uid);
    }

    #[test]
    fn explicit_resource_id_in_partial_wins() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();
        let partial = json!({"name": "web-2", "resourceid": "custom-id"});
        svc.update_raw("pod", &uid, &bytes(&partial)).unwrap();
        assert_eq!(
            svc.get(&uid).unwrap().unwrap().resource_id(),
            Some("custom-id")
        );
    }

    #[test]
    fn other_kinds_ignore_case() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("lab", "VM", br#"{"name": "vm-1", "cluster": "lab", "objtype": "VM"}"#)
            .unwrap();
        let entity = svc.get(&uid).unwrap().unwrap();
        assert_eq!(entity.objtype(), Some("vm"));
        assert_eq!(entity.resource_id(), Some("vm:lab:vm-1"));

        let partial = json!({"objtype": "Vm", "cpu": 2});
        svc.update_raw("vm", &uid, &bytes(&partial)).unwrap();
        assert_eq!(svc.delete("Vm", "vm:lab:vm-1").unwrap(), uid);
    }

    #[test]
    fn update_rejects_non_object_payload() {
        let (_, svc) = service();
        assert!(matches!(
            svc.update_raw("pod", &Uid::from("x"), b"[1]"),
            Err(AssetError::Decode(_))
        ));
    }

    #[test]
    fn delete_by_resource_id() {
        let (_, svc) = service();
        let uid = svc
            .create_raw("prod", "pod", &bytes(&pod_payload("web-1")))
            .unwrap();
        assert_eq!(svc.delete("pod", "pod:prod:shop:web-1").unwrap(), uid);
        assert!(svc.get(&uid).unwrap().is_none());
        assert!(matches!(
            svc.delete("pod", "pod:prod:shop:web-1"),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn sync_requires_array_before_acceptance() {
        let (_, svc) = service();
        let err = svc.sync("prod", "pod", &bytes(&pod_payload("web-1"))).unwrap_err();
        assert!(matches!(err, AssetError::Decode(DecodeError::ExpectedList { .. })));
        assert_eq!(svc.tracker().stats("pod").batches_accepted, 0);
    }

    #[test]
    fn sync_outside_runtime_is_refused() {
        let (_, svc) = service();
        assert!(matches!(
            svc.sync("prod", "pod", b"[]"),
            Err(AssetError::AsyncProcessing(_))
        ));
    }

    #[tokio::test]
    async fn sync_skips_malformed_elements() {
        let (store, svc) = service();
        let payload = json!([pod_payload("p1"), {"metadata": "not an object"}]);

        let accepted = svc.sync("prod", "pod", &bytes(&payload)).unwrap();
        assert_eq!(accepted, 2);
        svc.tracker().wait_idle().await;

        let stats = svc.tracker().stats("pod");
        assert_eq!(stats.entities_synced, 1);
        assert_eq!(stats.entities_failed, 1);
        assert_eq!(stats.batches_completed, 1);
        assert_eq!(store.entity_count().unwrap(), 1);
        assert!(store.find_by_resource_id("pod", "pod:prod:shop:p1").unwrap().is_some());
    }

    #[tokio::test]
    async fn repeated_sync_upserts_in_place() {
        let (store, svc) = service();
        let payload = bytes(&json!([pod_payload("p1")]));
        svc.sync("prod", "pod", &payload).unwrap();
        svc.tracker().wait_idle().await;
        svc.sync("prod", "pod", &payload).unwrap();
        svc.tracker().wait_idle().await;
        assert_eq!(store.entity_count().unwrap(), 1);
    }
}
