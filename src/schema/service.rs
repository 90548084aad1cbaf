//! Schema mutations, each followed by a wholesale cache invalidation

use super::cache::SchemaCache;
use super::predicate::{default_predicates, is_valid_field_name, Predicate, UID_FIELD};
use crate::error::{AssetError, AssetResult};
use crate::storage::SchemaStore;
use std::sync::Arc;

/// Upserts and drops predicates.
///
/// The cache is invalidated after every mutation attempt, successful or
/// not: a batch that fails half-way has already persisted its prefix.
#[derive(Clone)]
pub struct SchemaService {
    store: Arc<dyn SchemaStore>,
    cache: Arc<SchemaCache>,
}

impl SchemaService {
    pub fn new(store: Arc<dyn SchemaStore>, cache: Arc<SchemaCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    fn validate(predicate: &Predicate) -> AssetResult<()> {
        if predicate.name == UID_FIELD {
            return Err(AssetError::invalid("'uid' is intrinsic and cannot be redefined"));
        }
        if !is_valid_field_name(&predicate.name) {
            return Err(AssetError::invalid(format!(
                "invalid predicate name '{}'",
                predicate.name
            )));
        }
        Ok(())
    }

    fn write(&self, predicate: &Predicate) -> AssetResult<()> {
        Self::validate(predicate)?;
        self.store.upsert_predicate(predicate)?;
        tracing::info!(
            predicate = %predicate.name,
            value_type = %predicate.value_type,
            index = predicate.index,
            list = predicate.list,
            "predicate upserted"
        );
        Ok(())
    }

    /// Create or replace one predicate.
    pub fn upsert(&self, predicate: &Predicate) -> AssetResult<String> {
        let result = self.write(predicate);
        self.cache.invalidate();
        result.map(|()| predicate.name.clone())
    }

    /// Create or replace several predicates in order, stopping at the first failure.
    pub fn upsert_batch(&self, predicates: &[Predicate]) -> AssetResult<Vec<String>> {
        let result = predicates
            .iter()
            .map(|p| self.write(p).map(|()| p.name.clone()))
            .collect::<AssetResult<Vec<_>>>();
        self.cache.invalidate();
        result
    }

    /// Remove a predicate.
    pub fn drop(&self, name: &str) -> AssetResult<String> {
        let result = if name == UID_FIELD {
            Err(AssetError::invalid("'uid' is intrinsic and cannot be dropped"))
        } else {
            match self.store.drop_predicate(name) {
                Ok(true) => {
                    tracing::info!(predicate = %name, "predicate dropped");
                    Ok(name.to_string())
                }
                Ok(false) => Err(AssetError::NotFound(format!("predicate {}", name))),
                Err(e) => Err(e.into()),
            }
        };
        self.cache.invalidate();
        result
    }

    pub fn get(&self, name: &str) -> AssetResult<Option<Predicate>> {
        Ok(self.store.get_predicate(name)?)
    }

    pub fn list(&self) -> AssetResult<Vec<Predicate>> {
        Ok(self.store.list_predicates()?)
    }

    /// Insert the canonical predicates that are not defined yet.
    ///
    /// Existing definitions are left alone. Returns the names inserted.
    pub fn ensure_defaults(&self) -> AssetResult<Vec<String>> {
        let mut inserted = Vec::new();
        let result = (|| {
            for predicate in default_predicates() {
                if self.store.get_predicate(&predicate.name)?.is_none() {
                    self.store.upsert_predicate(&predicate)?;
                    inserted.push(predicate.name);
                }
            }
            Ok::<_, AssetError>(())
        })();
        self.cache.invalidate();
        result?;
        if !inserted.is_empty() {
            tracing::info!(count = inserted.len(), "default predicates seeded");
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueType;
    use crate::storage::{OpenStore, SqliteStore};

    fn service() -> SchemaService {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let cache = Arc::new(SchemaCache::new(store.clone()));
        SchemaService::new(store, cache)
    }

    #[test]
    fn upsert_invalidates_cache() {
        let svc = service();
        svc.upsert(&Predicate::new("phase", ValueType::String).indexed())
            .unwrap();
        svc.cache().resolve(&["phase"]).unwrap();
        assert_eq!(svc.cache().len(), 1);

        let generation = svc.cache().generation();
        svc.upsert(&Predicate::new("phase", ValueType::String)).unwrap();
        assert!(svc.cache().is_empty());
        assert!(svc.cache().generation() > generation);
    }

    #[test]
    fn batch_aborts_on_first_invalid_element_and_still_invalidates() {
        let svc = service();
        let generation = svc.cache().generation();
        let batch = vec![
            Predicate::new("first", ValueType::String),
            Predicate::new("bad name", ValueType::String),
            Predicate::new("third", ValueType::String),
        ];
        let err = svc.upsert_batch(&batch).unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));

        assert!(svc.get("first").unwrap().is_some());
        assert!(svc.get("third").unwrap().is_none());
        assert!(svc.cache().generation() > generation);
    }

    #[test]
    fn batch_returns_names_in_order() {
        let svc = service();
        let names = svc
            .upsert_batch(&[
                Predicate::new("b", ValueType::Int),
                Predicate::new("a", ValueType::Bool),
            ])
            .unwrap();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn drop_missing_predicate_is_not_found() {
        let svc = service();
        let generation = svc.cache().generation();
        let err = svc.drop("ghost").unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
        assert!(svc.cache().generation() > generation);
    }

    #[test]
    fn uid_cannot_be_defined_or_dropped() {
        let svc = service();
        assert!(svc.upsert(&Predicate::new("uid", ValueType::Uid)).is_err());
        assert!(matches!(svc.drop("uid"), Err(AssetError::Decode(_))));
    }

    #[test]
    fn ensure_defaults_is_idempotent_and_keeps_overrides() {
        let svc = service();
        svc.upsert(&Predicate::new("owner", ValueType::String)).unwrap();

        let inserted = svc.ensure_defaults().unwrap();
        assert!(!inserted.iter().any(|n| n == "owner"));
        assert!(inserted.iter().any(|n| n == "objtype"));
        assert!(!svc.get("owner").unwrap().unwrap().index);

        assert!(svc.ensure_defaults().unwrap().is_empty());
    }
}
