//! Two-phase query execution
//!
//! The count and the page are two independent store round-trips. A write
//! landing between them can make `count` disagree with the page; callers of
//! an eventually consistent mirror accept that.

use super::compiler::{CompiledQuery, QueryCompiler};
use super::types::{Pagination, QueryLimits, QueryResult, QueryRows};
use crate::error::AssetResult;
use crate::storage::{GraphStore, StorageError};
use std::sync::Arc;

/// Runs filtered, paginated, counted queries.
#[derive(Clone)]
pub struct QueryExecutor {
    compiler: QueryCompiler,
    store: Arc<dyn GraphStore>,
    limits: QueryLimits,
}

impl QueryExecutor {
    pub fn new(compiler: QueryCompiler, store: Arc<dyn GraphStore>, limits: QueryLimits) -> Self {
        Self {
            compiler,
            store,
            limits,
        }
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    pub fn execute(&self, filter: &str, pagination: Pagination) -> AssetResult<QueryResult> {
        let compiled = self.compiler.compile(filter)?;
        let limit = pagination.resolve_limit(self.limits.default_limit, self.limits.max_limit);

        let count = self.count(&compiled.count_plan())?;
        let entities = match self
            .store
            .execute_query(&compiled.page_plan(pagination.offset, limit))?
        {
            QueryRows::Entities(entities) => entities,
            QueryRows::Count(_) => {
                return Err(StorageError::Malformed("page plan returned a count".into()).into())
            }
        };

        tracing::debug!(
            count,
            returned = entities.len(),
            offset = pagination.offset,
            limit,
            "query executed"
        );
        Ok(QueryResult { count, entities })
    }

    fn count(&self, plan: &CompiledQuery) -> AssetResult<u64> {
        match self.store.execute_query(plan)? {
            QueryRows::Count(n) => Ok(n),
            QueryRows::Entities(_) => {
                Err(StorageError::Malformed("count plan returned rows".into()).into())
            }
        }
    }
}
