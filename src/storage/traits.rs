//! Storage trait definitions

use crate::entity::{Entity, Uid};
use crate::query::{CompiledQuery, QueryRows};
use crate::schema::Predicate;
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend returned data of an unexpected shape
    #[error("Malformed data: {0}")]
    Malformed(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for entity storage backends
///
/// Implementations must be thread-safe (Send + Sync); the sync path writes
/// from background tasks while requests read.
pub trait GraphStore: Send + Sync {
    /// Persist a new entity and return the identifier assigned to it.
    ///
    /// Any `uid` already present in the attributes is replaced.
    fn create(&self, entity: &Entity) -> StorageResult<Uid>;

    /// Merge top-level attributes into an existing entity.
    ///
    /// Returns false when `uid` does not exist.
    fn update(&self, uid: &Uid, attributes: &Map<String, Value>) -> StorageResult<bool>;

    /// Returns false when `uid` does not exist.
    fn delete(&self, uid: &Uid) -> StorageResult<bool>;

    fn get(&self, uid: &Uid) -> StorageResult<Option<Entity>>;

    /// Look up an entity by its external identity within one kind.
    fn find_by_resource_id(&self, objtype: &str, resource_id: &str) -> StorageResult<Option<Uid>>;

    /// Insert, or replace the attributes of the entity with the same
    /// `objtype` and `resourceid`. The existing uid is kept.
    fn upsert(&self, entity: &Entity) -> StorageResult<Uid> {
        let objtype = entity.objtype().unwrap_or_default();
        let resource_id = entity.resource_id().unwrap_or_default();
        match self.find_by_resource_id(objtype, resource_id)? {
            Some(uid) => {
                let mut attributes = entity.attributes().clone();
                attributes.remove(crate::entity::attr::UID);
                self.update(&uid, &attributes)?;
                Ok(uid)
            }
            None => self.create(entity),
        }
    }

    /// Run one compiled plan. Count plans yield `QueryRows::Count`, page
    /// plans yield `QueryRows::Entities`.
    fn execute_query(&self, query: &CompiledQuery) -> StorageResult<QueryRows>;
}

/// Trait for predicate (field schema) persistence
pub trait SchemaStore: Send + Sync {
    fn upsert_predicate(&self, predicate: &Predicate) -> StorageResult<()>;

    /// Returns false when no predicate with that name exists.
    fn drop_predicate(&self, name: &str) -> StorageResult<bool>;

    fn get_predicate(&self, name: &str) -> StorageResult<Option<Predicate>>;

    /// All predicates, ordered by name.
    fn list_predicates(&self) -> StorageResult<Vec<Predicate>>;

    /// Metadata for each name, positionally aligned with `names`.
    fn resolve_field_metadata(&self, names: &[String]) -> StorageResult<Vec<Option<Predicate>>> {
        names.iter().map(|n| self.get_predicate(n)).collect()
    }
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + SchemaStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
