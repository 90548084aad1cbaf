//! Predicate definitions: the per-field schema shared by all entities

use crate::entity::attr;
use serde::{Deserialize, Serialize};

/// Intrinsic identifier field. Always resolvable; never a predicate.
pub const UID_FIELD: &str = attr::UID;

/// Value type of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Datetime,
    Uid,
    /// Opaque nested structure; stored but not filterable
    Json,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Datetime => "datetime",
            ValueType::Uid => "uid",
            ValueType::Json => "json",
        }
    }

    pub fn is_filterable(&self) -> bool {
        !matches!(self, ValueType::Json)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => ValueType::String,
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "bool" => ValueType::Bool,
            "datetime" => ValueType::Datetime,
            "uid" => ValueType::Uid,
            "json" => ValueType::Json,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema for one field across all entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(alias = "predicate")]
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub list: bool,
}

impl Predicate {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            index: false,
            list: false,
        }
    }

    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }
}

/// Field-name grammar shared by predicate names and QSL field references:
/// letters, digits, `_`, `.` and `-`, not starting with a digit, `.` or `-`.
pub fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Predicates seeded at startup for the canonical attributes.
pub fn default_predicates() -> Vec<Predicate> {
    vec![
        Predicate::new(attr::OBJTYPE, ValueType::String).indexed(),
        Predicate::new(attr::NAME, ValueType::String).indexed(),
        Predicate::new(attr::NAMESPACE, ValueType::String).indexed(),
        Predicate::new(attr::CLUSTER, ValueType::String).indexed(),
        Predicate::new(attr::RESOURCE_ID, ValueType::String).indexed(),
        Predicate::new(attr::CREATION_TIME, ValueType::Datetime).indexed(),
        Predicate::new(attr::RESOURCE_VERSION, ValueType::String).indexed(),
        Predicate::new(attr::LABELS, ValueType::Json),
        Predicate::new(attr::K8S_OBJ, ValueType::String).indexed(),
        Predicate::new(attr::APPLICATION, ValueType::String).indexed().list(),
        Predicate::new(attr::ASSET, ValueType::String).indexed(),
        Predicate::new(attr::OWNER, ValueType::String).indexed(),
        Predicate::new(attr::OWNER_TYPE, ValueType::String).indexed(),
    ]
}
