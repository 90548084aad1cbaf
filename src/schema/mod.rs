//! Field schema: predicate definitions, the metadata cache the query
//! compiler reads through, and the mutations that invalidate it.

mod cache;
mod predicate;
mod service;

pub use cache::{SchemaCache, SchemaSnapshot};
pub use predicate::{default_predicates, is_valid_field_name, Predicate, ValueType, UID_FIELD};
pub use service::SchemaService;
