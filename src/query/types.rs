//! Query types and result structures

use crate::entity::Entity;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 1000;

/// Page bounds, supplied separately from the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    /// None means the configured default
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Effective limit: the default when unset, clamped to `max_limit`.
    pub fn resolve_limit(&self, default_limit: usize, max_limit: usize) -> usize {
        self.limit.unwrap_or(default_limit).min(max_limit)
    }
}

/// Limits applied to every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Result of a filtered query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Total matches, independent of the page bound
    pub count: u64,
    /// The requested page, in insertion order
    pub entities: Vec<Entity>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            count: 0,
            entities: Vec::new(),
        }
    }
}

/// Raw output of executing one compiled plan
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRows {
    Count(u64),
    Entities(Vec<Entity>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        let unset = Pagination::default();
        assert_eq!(unset.resolve_limit(50, 1000), 50);
        assert_eq!(Pagination::new(0, 5000).resolve_limit(50, 1000), 1000);
        assert_eq!(Pagination::new(10, 0).resolve_limit(50, 1000), 0);
    }

    #[test]
    fn result_serializes_count_and_entities() {
        let json = serde_json::to_value(QueryResult::empty()).unwrap();
        assert_eq!(json, serde_json::json!({"count": 0, "entities": []}));
    }
}
