//! Rendering of compiled plans into SQLite statements
//!
//! Attributes live in one JSON column, so every comparison goes through
//! `json_extract`. Paths and literals are always bound, never spliced.

use crate::query::{CompareOp, CompiledQuery, Condition, FieldRef, Projection, Scalar};
use chrono::SecondsFormat;

/// A statement ready to prepare
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl RenderedQuery {
    pub fn param_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|b| b.as_ref()).collect()
    }
}

const ATTRS: &str = "e.attributes_json";

fn json_path(name: &str) -> String {
    format!("$.\"{}\"", name)
}

fn scalar_param(value: &Scalar) -> Box<dyn rusqlite::ToSql> {
    match value {
        Scalar::Text(s) => Box::new(s.clone()),
        Scalar::Int(i) => Box::new(*i),
        Scalar::Float(f) => Box::new(*f),
        // json_extract yields 1/0 for JSON booleans
        Scalar::Bool(b) => Box::new(i64::from(*b)),
        Scalar::Datetime(t) => Box::new(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

fn sql_operator(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "IS NOT",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
        // handled separately
        CompareOp::Contains | CompareOp::StartsWith => "=",
    }
}

struct Renderer {
    sql: String,
    params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl Renderer {
    fn bind(&mut self, param: Box<dyn rusqlite::ToSql>) {
        self.params.push(param);
        self.sql.push('?');
    }

    fn condition(&mut self, condition: &Condition) {
        match condition {
            Condition::And(items) => self.join(items, " AND ", "1"),
            Condition::Or(items) => self.join(items, " OR ", "0"),
            Condition::Not(inner) => {
                self.sql.push_str("NOT (");
                self.condition(inner);
                self.sql.push(')');
            }
            Condition::Exists { field } => match field {
                FieldRef::Uid => self.sql.push_str("e.uid IS NOT NULL"),
                FieldRef::Attribute { name, .. } => {
                    self.sql.push_str("coalesce(json_type(");
                    self.sql.push_str(ATTRS);
                    self.sql.push_str(", ");
                    self.bind(Box::new(json_path(name)));
                    self.sql.push_str("), 'null') != 'null'");
                }
            },
            Condition::Compare { field, op, value } => match field {
                FieldRef::Uid => {
                    self.sql.push_str("e.uid ");
                    self.sql.push_str(sql_operator(*op));
                    self.sql.push(' ');
                    self.bind(scalar_param(value));
                }
                FieldRef::Attribute { name, list: true, .. } => {
                    if *op == CompareOp::Ne {
                        self.sql.push_str("NOT ");
                    }
                    self.sql.push_str("EXISTS (SELECT 1 FROM json_each(");
                    self.sql.push_str(ATTRS);
                    self.sql.push_str(", ");
                    self.bind(Box::new(json_path(name)));
                    self.sql.push_str(") AS j WHERE ");
                    self.instant_open(value);
                    self.sql.push_str("j.value");
                    self.instant_close(value);
                    self.sql.push_str(" = ");
                    self.operand(value);
                    self.sql.push(')');
                }
                FieldRef::Attribute { name, .. } => self.scalar_compare(name, *op, value),
            },
        }
    }

    fn join(&mut self, items: &[Condition], separator: &str, empty: &str) {
        if items.is_empty() {
            self.sql.push_str(empty);
            return;
        }
        self.sql.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.condition(item);
        }
        self.sql.push(')');
    }

    // datetimes compare as instants, whatever offset they were written with
    fn instant_open(&mut self, value: &Scalar) {
        if matches!(value, Scalar::Datetime(_)) {
            self.sql.push_str("julianday(");
        }
    }

    fn instant_close(&mut self, value: &Scalar) {
        if matches!(value, Scalar::Datetime(_)) {
            self.sql.push(')');
        }
    }

    fn operand(&mut self, value: &Scalar) {
        self.instant_open(value);
        self.bind(scalar_param(value));
        self.instant_close(value);
    }

    fn extract(&mut self, name: &str) {
        self.sql.push_str("json_extract(");
        self.sql.push_str(ATTRS);
        self.sql.push_str(", ");
        self.bind(Box::new(json_path(name)));
        self.sql.push(')');
    }

    fn scalar_compare(&mut self, name: &str, op: CompareOp, value: &Scalar) {
        match op {
            CompareOp::Contains => {
                self.sql.push_str("instr(");
                self.extract(name);
                self.sql.push_str(", ");
                self.bind(scalar_param(value));
                self.sql.push_str(") > 0");
            }
            CompareOp::StartsWith => {
                self.sql.push_str("substr(");
                self.extract(name);
                self.sql.push_str(", 1, length(");
                self.bind(scalar_param(value));
                self.sql.push_str(")) = ");
                self.bind(scalar_param(value));
            }
            _ => {
                self.instant_open(value);
                self.extract(name);
                self.instant_close(value);
                self.sql.push(' ');
                self.sql.push_str(sql_operator(op));
                self.sql.push(' ');
                self.operand(value);
            }
        }
    }
}

/// Render a count or page plan over the `entities` table.
pub fn render(query: &CompiledQuery) -> RenderedQuery {
    let mut renderer = Renderer {
        sql: String::new(),
        params: Vec::new(),
    };

    match query.projection {
        Projection::Count => renderer.sql.push_str("SELECT COUNT(*) FROM entities e WHERE "),
        Projection::Page { .. } => renderer
            .sql
            .push_str("SELECT e.attributes_json FROM entities e WHERE "),
    }
    renderer.condition(&query.condition);

    if let Projection::Page { offset, limit } = query.projection {
        renderer.sql.push_str(" ORDER BY e.rowid LIMIT ");
        renderer.bind(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        renderer.sql.push_str(" OFFSET ");
        renderer.bind(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));
    }

    RenderedQuery {
        sql: renderer.sql,
        params: renderer.params,
    }
}
