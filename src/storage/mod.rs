//! Storage backends for the asset inventory
//!
//! Services see storage only through the `GraphStore` and `SchemaStore`
//! traits. The shipped implementation is `SqliteStore`.

mod sqlite;
mod sqlite_query;
mod traits;

pub use sqlite::SqliteStore;
pub use sqlite_query::{render, RenderedQuery};
pub use traits::{GraphStore, OpenStore, SchemaStore, StorageError, StorageResult};
