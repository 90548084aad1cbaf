//! assetgraph: ingestion and query core of a cluster asset inventory
//!
//! Heterogeneous resource payloads (pods, deployments, services, ...) are
//! normalized into one canonical entity shape, stored, and queried with a
//! small filter language (QSL).
//!
//! # Core Concepts
//!
//! - **Entities**: canonical attribute maps with a store-assigned `uid`
//! - **Kinds**: resource categories, each with its own normalizer
//! - **Predicates**: per-field schema (type, indexed, list) the query compiler reads
//!
//! # Example
//!
//! ```
//! use assetgraph::{AssetApi, AssetConfig, Pagination};
//!
//! let api = AssetApi::open_in_memory(&AssetConfig::default()).unwrap();
//! let result = api.run_query("objtype = pod", Pagination::default()).unwrap();
//! assert_eq!(result.count, 0);
//! ```

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod storage;

pub use api::{AssetApi, DeletedEntity, EntityRef, Envelope, SyncAccepted};
pub use config::{AssetConfig, ConfigError};
pub use entity::{Entity, Uid};
pub use error::{AssetError, AssetResult};
pub use ingest::{EntityService, KindSyncStats, SyncTracker};
pub use normalize::{DecodeError, Kind, NormalizerRegistry};
pub use query::{CompileError, Pagination, QueryResult};
pub use schema::{Predicate, SchemaCache, SchemaService, ValueType};
pub use storage::{GraphStore, OpenStore, SchemaStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
