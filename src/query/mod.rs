//! Query system for the asset inventory
//!
//! Parses QSL filters, binds them to the field schema and runs them as a
//! count plan plus a page plan.

mod compiler;
mod executor;
mod parser;
mod types;

pub use compiler::{
    bind, CompileError, CompiledFilter, CompiledQuery, Condition, FieldRef, Projection,
    QueryCompiler, Scalar,
};
pub use executor::QueryExecutor;
pub use parser::{parse, CompareOp, Expr, Literal, MAX_NESTING};
pub use types::{Pagination, QueryLimits, QueryResult, QueryRows, DEFAULT_LIMIT, MAX_LIMIT};
