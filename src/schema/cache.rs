//! Schema cache coordinator
//!
//! Holds resolved predicate metadata for the query compiler. Every schema
//! mutation clears the whole cache. A generation counter keeps a resolver
//! that raced with an invalidation from publishing what it read before it.

use super::predicate::Predicate;
use crate::storage::{SchemaStore, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    entries: HashMap<String, Arc<Predicate>>,
}

/// Metadata resolved for one compilation. Fixed for the compiled query's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    fields: HashMap<String, Arc<Predicate>>,
    missing: Vec<String>,
}

impl SchemaSnapshot {
    pub fn get(&self, name: &str) -> Option<&Arc<Predicate>> {
        self.fields.get(name)
    }

    /// Requested names with no predicate, in request order.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Shared cache of predicate metadata in front of a `SchemaStore`.
pub struct SchemaCache {
    store: Arc<dyn SchemaStore>,
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve metadata for `names`, filling the cache from the store on miss.
    ///
    /// Unknown names are reported in the snapshot, not as an error; only
    /// backend failures are errors.
    pub fn resolve(&self, names: &[&str]) -> StorageResult<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::default();
        let mut to_fetch: Vec<String> = Vec::new();

        let observed_generation = {
            let state = self.state.read().unwrap();
            for name in names {
                if snapshot.fields.contains_key(*name) || to_fetch.iter().any(|n| n.as_str() == *name) {
                    continue;
                }
                match state.entries.get(*name) {
                    Some(p) => {
                        snapshot.fields.insert(name.to_string(), Arc::clone(p));
                    }
                    None => to_fetch.push(name.to_string()),
                }
            }
            state.generation
        };

        self.hits
            .fetch_add(snapshot.fields.len() as u64, Ordering::Relaxed);
        if to_fetch.is_empty() {
            return Ok(snapshot);
        }
        self.misses.fetch_add(to_fetch.len() as u64, Ordering::Relaxed);

        let fetched = self.store.resolve_field_metadata(&to_fetch)?;

        let mut state = self.state.write().unwrap();
        let publish = state.generation == observed_generation;
        for (name, predicate) in to_fetch.into_iter().zip(fetched) {
            match predicate {
                Some(p) => {
                    let p = Arc::new(p);
                    if publish {
                        state.entries.insert(name.clone(), Arc::clone(&p));
                    }
                    snapshot.fields.insert(name, p);
                }
                None => snapshot.missing.push(name),
            }
        }
        Ok(snapshot)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap();
        state.generation += 1;
        state.entries.clear();
        tracing::debug!(generation = state.generation, "schema cache invalidated");
    }

    pub fn generation(&self) -> u64 {
        self.state.read().unwrap().generation
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
