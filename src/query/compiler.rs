//! QSL compiler
//!
//! Binds a parsed filter to field metadata from the schema cache and
//! produces a backend-neutral condition tree. The count plan and the page
//! plan are both built from one compilation, so they see the same snapshot.

use super::parser::{self, CompareOp, Expr, Literal};
use crate::error::AssetResult;
use crate::schema::{SchemaCache, SchemaSnapshot, ValueType, UID_FIELD};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Filter rejected before reaching the store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("empty filter")]
    Empty,

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{0}' is not indexed")]
    NotIndexed(String),

    #[error("field '{0}' holds opaque json and cannot be compared")]
    NotFilterable(String),

    #[error("field '{field}' expects {expected}, got '{found}'")]
    TypeMismatch {
        field: String,
        expected: ValueType,
        found: String,
    },

    #[error("operator '{op}' is not supported on field '{field}'")]
    UnsupportedOperator { field: String, op: CompareOp },
}

impl CompileError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// A compared field, resolved against the schema
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// The intrinsic identifier
    Uid,
    Attribute {
        name: String,
        value_type: ValueType,
        list: bool,
    },
}

/// Literal coerced to the field's type
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Datetime(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// For list fields `Eq` and `Contains` mean membership, `Ne` non-membership
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Scalar,
    },
    Exists {
        field: FieldRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Count,
    Page { offset: usize, limit: usize },
}

/// One executable plan
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub condition: Arc<Condition>,
    pub projection: Projection,
}

/// A filter bound to one schema snapshot
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    condition: Arc<Condition>,
}

impl CompiledFilter {
    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    /// Plan A: all matches, counted, no page bound.
    pub fn count_plan(&self) -> CompiledQuery {
        CompiledQuery {
            condition: Arc::clone(&self.condition),
            projection: Projection::Count,
        }
    }

    /// Plan B: the same filter with offset and limit.
    pub fn page_plan(&self, offset: usize, limit: usize) -> CompiledQuery {
        CompiledQuery {
            condition: Arc::clone(&self.condition),
            projection: Projection::Page { offset, limit },
        }
    }
}

/// Compiles filters through the schema cache.
#[derive(Clone)]
pub struct QueryCompiler {
    cache: Arc<SchemaCache>,
}

impl QueryCompiler {
    pub fn new(cache: Arc<SchemaCache>) -> Self {
        Self { cache }
    }

    pub fn compile(&self, filter: &str) -> AssetResult<CompiledFilter> {
        let expr = parser::parse(filter)?;
        let names: Vec<&str> = expr
            .fields()
            .into_iter()
            .filter(|f| *f != UID_FIELD)
            .collect();
        let snapshot = self.cache.resolve(&names)?;
        let condition = bind(&expr, &snapshot)?;
        tracing::debug!(filter = %filter, fields = names.len(), "filter compiled");
        Ok(CompiledFilter {
            condition: Arc::new(condition),
        })
    }
}

/// Bind an expression to resolved metadata.
pub fn bind(expr: &Expr, snapshot: &SchemaSnapshot) -> Result<Condition, CompileError> {
    match expr {
        Expr::And(items) => Ok(Condition::And(
            items.iter().map(|e| bind(e, snapshot)).collect::<Result<_, _>>()?,
        )),
        Expr::Or(items) => Ok(Condition::Or(
            items.iter().map(|e| bind(e, snapshot)).collect::<Result<_, _>>()?,
        )),
        Expr::Not(inner) => Ok(Condition::Not(Box::new(bind(inner, snapshot)?))),
        Expr::Exists { field } => Ok(Condition::Exists {
            field: resolve_field(field, snapshot)?,
        }),
        Expr::Compare { field, op, value } => {
            let resolved = resolve_field(field, snapshot)?;
            let value = match &resolved {
                FieldRef::Uid => {
                    if !matches!(op, CompareOp::Eq | CompareOp::Ne) {
                        return Err(unsupported(field, *op));
                    }
                    Scalar::Text(value.as_text())
                }
                FieldRef::Attribute {
                    value_type, list, ..
                } => {
                    let predicate = snapshot
                        .get(field)
                        .ok_or_else(|| CompileError::UnknownField(field.clone()))?;
                    if !value_type.is_filterable() {
                        return Err(CompileError::NotFilterable(field.clone()));
                    }
                    if !predicate.index {
                        return Err(CompileError::NotIndexed(field.clone()));
                    }
                    check_operator(field, *value_type, *list, *op)?;
                    coerce(field, *value_type, value)?
                }
            };
            Ok(Condition::Compare {
                field: resolved,
                op: *op,
                value,
            })
        }
    }
}

fn resolve_field(name: &str, snapshot: &SchemaSnapshot) -> Result<FieldRef, CompileError> {
    if name == UID_FIELD {
        return Ok(FieldRef::Uid);
    }
    let predicate = snapshot
        .get(name)
        .ok_or_else(|| CompileError::UnknownField(name.to_string()))?;
    Ok(FieldRef::Attribute {
        name: predicate.name.clone(),
        value_type: predicate.value_type,
        list: predicate.list,
    })
}

fn unsupported(field: &str, op: CompareOp) -> CompileError {
    CompileError::UnsupportedOperator {
        field: field.to_string(),
        op,
    }
}

fn check_operator(
    field: &str,
    value_type: ValueType,
    list: bool,
    op: CompareOp,
) -> Result<(), CompileError> {
    let allowed = if list {
        matches!(op, CompareOp::Eq | CompareOp::Ne | CompareOp::Contains)
    } else {
        match op {
            CompareOp::Eq | CompareOp::Ne => true,
            CompareOp::Contains | CompareOp::StartsWith => {
                matches!(value_type, ValueType::String | ValueType::Uid)
            }
            _ => value_type != ValueType::Bool,
        }
    };
    if allowed {
        Ok(())
    } else {
        Err(unsupported(field, op))
    }
}

fn coerce(field: &str, value_type: ValueType, literal: &Literal) -> Result<Scalar, CompileError> {
    let mismatch = || CompileError::TypeMismatch {
        field: field.to_string(),
        expected: value_type,
        found: literal.as_text(),
    };
    match value_type {
        ValueType::String | ValueType::Uid => Ok(Scalar::Text(literal.as_text())),
        ValueType::Datetime => {
            DateTime::parse_from_rfc3339(&literal.as_text())
                .map(|t| Scalar::Datetime(t.with_timezone(&Utc)))
                .map_err(|_| mismatch())
        }
        ValueType::Int => match literal {
            Literal::Number(n) => n.parse::<i64>().map(Scalar::Int).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ValueType::Float => match literal {
            Literal::Number(n) => n.parse::<f64>().map(Scalar::Float).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ValueType::Bool => match literal {
            Literal::Bool(b) => Ok(Scalar::Bool(*b)),
            _ => Err(mismatch()),
        },
        ValueType::Json => Err(CompileError::NotFilterable(field.to_string())),
    }
}
