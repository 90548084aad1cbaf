//! Transport-independent API layer.
//!
//! `AssetApi` is the single entry point for consumer-facing operations.
//! Transports (the CLI, or an HTTP layer embedding the crate) call these
//! methods and render outcomes with `Envelope`; they never reach into the
//! services or the store directly.

use crate::config::AssetConfig;
use crate::entity::{Entity, Uid};
use crate::error::{AssetError, AssetResult};
use crate::ingest::{canonical_kind, EntityService, KindSyncStats};
use crate::normalize::{DecodeError, NormalizerRegistry};
use crate::query::{Pagination, QueryCompiler, QueryExecutor, QueryResult};
use crate::schema::{Predicate, SchemaCache, SchemaService};
use crate::storage::{GraphStore, OpenStore, SchemaStore, SqliteStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Identity of a written entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub uid: Uid,
    pub objtype: String,
}

/// Identity of a deleted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedEntity {
    pub resourceid: String,
    pub objtype: String,
    pub uid: Uid,
}

/// Acknowledgement of a sync batch. Carries no identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAccepted {
    pub objtype: String,
    pub accepted: usize,
}

/// Single entry point for all consumer-facing operations.
#[derive(Clone)]
pub struct AssetApi {
    default_cluster: String,
    entities: EntityService,
    schema: SchemaService,
    queries: QueryExecutor,
}

impl AssetApi {
    /// Wire the services over `store` and seed the default predicates.
    pub fn new<S>(store: Arc<S>, config: &AssetConfig) -> AssetResult<Self>
    where
        S: GraphStore + SchemaStore + 'static,
    {
        let registry = Arc::new(NormalizerRegistry::with_defaults(
            config.normalizer.asset_annotation.clone(),
        ));
        let cache = Arc::new(SchemaCache::new(store.clone()));
        let schema = SchemaService::new(store.clone(), Arc::clone(&cache));
        let queries = QueryExecutor::new(
            QueryCompiler::new(cache),
            store.clone(),
            config.query_limits(),
        );
        let entities = EntityService::new(registry, store);

        schema.ensure_defaults()?;

        Ok(Self {
            default_cluster: config.cluster.clone(),
            entities,
            schema,
            queries,
        })
    }

    /// Open (or create) the SQLite database named by the configuration.
    pub fn open(config: &AssetConfig) -> AssetResult<Self> {
        let store = SqliteStore::open(&config.database)?;
        tracing::info!(database = %config.database.display(), "store opened");
        Self::new(Arc::new(store), config)
    }

    pub fn open_in_memory(config: &AssetConfig) -> AssetResult<Self> {
        Self::new(Arc::new(SqliteStore::open_in_memory()?), config)
    }

    fn cluster<'a>(&'a self, cluster: Option<&'a str>) -> &'a str {
        cluster.unwrap_or(&self.default_cluster)
    }

    // --- Entities ---

    pub fn create_entity(
        &self,
        cluster: Option<&str>,
        kind: &str,
        payload: &[u8],
    ) -> AssetResult<EntityRef> {
        let uid = self.entities.create_raw(self.cluster(cluster), kind, payload)?;
        Ok(EntityRef {
            uid,
            objtype: canonical_kind(kind),
        })
    }

    pub fn update_entity(&self, kind: &str, uid: &str, payload: &[u8]) -> AssetResult<EntityRef> {
        let uid = self.entities.update_raw(kind, &Uid::from(uid), payload)?;
        Ok(EntityRef {
            uid,
            objtype: canonical_kind(kind),
        })
    }

    pub fn delete_entity(&self, kind: &str, resource_id: &str) -> AssetResult<DeletedEntity> {
        let uid = self.entities.delete(kind, resource_id)?;
        Ok(DeletedEntity {
            resourceid: resource_id.to_string(),
            objtype: canonical_kind(kind),
            uid,
        })
    }

    /// `Ok(None)` when no entity has this uid.
    pub fn get_entity(&self, uid: &str) -> AssetResult<Option<Entity>> {
        self.entities.get(&Uid::from(uid))
    }

    /// Accept a JSON array for background ingestion. Must run inside a Tokio runtime.
    pub fn sync_entities(
        &self,
        cluster: Option<&str>,
        kind: &str,
        payload: &[u8],
    ) -> AssetResult<SyncAccepted> {
        let accepted = self.entities.sync(self.cluster(cluster), kind, payload)?;
        Ok(SyncAccepted {
            objtype: canonical_kind(kind),
            accepted,
        })
    }

    /// Resolve once every accepted sync batch has finished.
    pub async fn wait_for_sync(&self) {
        self.entities.tracker().wait_idle().await
    }

    pub fn sync_stats(&self) -> BTreeMap<String, KindSyncStats> {
        self.entities.tracker().snapshot()
    }

    // --- Queries ---

    pub fn run_query(&self, filter: &str, pagination: Pagination) -> AssetResult<QueryResult> {
        self.queries.execute(filter, pagination)
    }

    // --- Schema ---

    /// Upsert one predicate object or a list of them; returns the names written.
    pub fn upsert_schema(&self, payload: &[u8]) -> AssetResult<Vec<String>> {
        let value: Value = serde_json::from_slice(payload).map_err(DecodeError::Json)?;
        let malformed = |source| DecodeError::Malformed {
            kind: "predicate".to_string(),
            source,
        };
        match value {
            Value::Array(_) => {
                let predicates: Vec<Predicate> =
                    serde_json::from_value(value).map_err(malformed)?;
                self.schema.upsert_batch(&predicates)
            }
            Value::Object(_) => {
                let predicate: Predicate = serde_json::from_value(value).map_err(malformed)?;
                Ok(vec![self.schema.upsert(&predicate)?])
            }
            _ => Err(AssetError::invalid("expected a predicate or a list of predicates")),
        }
    }

    pub fn upsert_predicates(&self, predicates: &[Predicate]) -> AssetResult<Vec<String>> {
        self.schema.upsert_batch(predicates)
    }

    pub fn drop_schema(&self, name: &str) -> AssetResult<String> {
        self.schema.drop(name)
    }

    /// A single predicate; `NotFound` when it is not defined.
    pub fn get_schema(&self, name: &str) -> AssetResult<Predicate> {
        self.schema
            .get(name)?
            .ok_or_else(|| AssetError::NotFound(format!("predicate {}", name)))
    }

    pub fn list_schema(&self) -> AssetResult<Vec<Predicate>> {
        self.schema.list()
    }
}

/// Response shape shared by every transport.
///
/// `{"status": <code>, "objects": ...}` on success, `"message"` for
/// acknowledgements, `"error"` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok<T: Serialize>(objects: &T) -> Self {
        match serde_json::to_value(objects) {
            Ok(objects) => Self {
                status: 200,
                objects: Some(objects),
                message: None,
                error: None,
            },
            Err(e) => Self::failure(500, e.to_string()),
        }
    }

    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            status: 202,
            objects: None,
            message: Some(message.into()),
            error: None,
        }
    }

    fn failure(status: u16, error: String) -> Self {
        Self {
            status,
            objects: None,
            message: None,
            error: Some(error),
        }
    }

    pub fn error(err: &AssetError) -> Self {
        Self::failure(err.status_code(), err.to_string())
    }

    pub fn from_result<T: Serialize>(result: &AssetResult<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::error(e),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api() -> AssetApi {
        AssetApi::open_in_memory(&AssetConfig::default()).unwrap()
    }

    #[test]
    fn new_seeds_default_schema() {
        let api = api();
        let names: Vec<_> = api.list_schema().unwrap().into_iter().map(|p| p.name).collect();
        assert!(names.iter().any(|n| n == "objtype"));
        assert!(names.iter().any(|n| n == "application"));
    }

    #[test]
    fn create_uses_default_cluster() {
        let api = api();
        let created = api
            .create_entity(None, "namespace", br#"{"metadata": {"name": "shop"}}"#)
            .unwrap();
        assert_eq!(created.objtype, "namespace");
        let entity = api.get_entity(created.uid.as_str()).unwrap().unwrap();
        assert_eq!(entity.get_str("cluster"), Some("default"));
    }

    #[test]
    fn upsert_schema_accepts_object_or_list() {
        let api = api();
        let one = api
            .upsert_schema(br#"{"name": "phase", "type": "string", "index": true}"#)
            .unwrap();
        assert_eq!(one, vec!["phase"]);
        let many = api
            .upsert_schema(br#"[{"predicate": "ip", "type": "string"}, {"name": "numReplicas", "type": "int"}]"#)
            .unwrap();
        assert_eq!(many, vec!["ip", "numReplicas"]);
        assert!(matches!(
            api.upsert_schema(br#"{"name": "x", "type": "geo"}"#),
            Err(AssetError::Decode(_))
        ));
        assert!(matches!(api.upsert_schema(b"42"), Err(AssetError::Decode(_))));
    }

    #[test]
    fn get_schema_reports_missing_predicates() {
        let api = api();
        let objtype = api.get_schema("objtype").unwrap();
        assert_eq!(objtype.name, "objtype");

        let missing = api.get_schema("ghost");
        assert!(matches!(missing, Err(AssetError::NotFound(_))));
        assert_eq!(Envelope::from_result(&missing).status, 404);

        api.drop_schema("objtype").unwrap();
        assert!(matches!(api.get_schema("objtype"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn envelope_shapes() {
        let ok = Envelope::ok(&json!({"uid": "u1"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"status": 200, "objects": {"uid": "u1"}})
        );

        let accepted = Envelope::accepted("sync accepted");
        assert_eq!(
            serde_json::to_value(&accepted).unwrap(),
            json!({"status": 202, "message": "sync accepted"})
        );

        let missing = Envelope::error(&AssetError::NotFound("entity u2".into()));
        assert_eq!(missing.status, 404);
        assert_eq!(missing.error.as_deref(), Some("entity u2 not found"));
        assert!(!missing.is_success());
    }

    #[test]
    fn sync_inside_runtime_drains() {
        let api = api();
        tokio_test::block_on(async {
            let accepted = api
                .sync_entities(
                    Some("lab"),
                    "namespace",
                    br#"[{"metadata": {"name": "a"}}, {"metadata": {"name": "b"}}]"#,
                )
                .unwrap();
            assert_eq!(accepted.objtype, "namespace");
            assert_eq!(accepted.accepted, 2);
            api.wait_for_sync().await;
        });
        assert_eq!(api.sync_stats()["namespace"].entities_synced, 2);
    }

    #[test]
    fn envelope_classifies_results() {
        let api = api();
        let result = api.run_query("ghost = 1", Pagination::default());
        assert_eq!(Envelope::from_result(&result).status, 400);
        let result = api.run_query("objtype = pod", Pagination::default());
        assert_eq!(Envelope::from_result(&result).status, 200);
    }
}
