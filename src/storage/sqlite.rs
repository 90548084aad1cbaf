//! SQLite storage backend for the asset inventory

use super::sqlite_query::render;
use super::traits::{GraphStore, OpenStore, SchemaStore, StorageError, StorageResult};
use crate::entity::{attr, Entity, Uid};
use crate::query::{CompiledQuery, Projection, QueryRows};
use crate::schema::{Predicate, ValueType};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed entity and schema store
///
/// Entities are stored as one JSON document each, with `objtype` and
/// `resourceid` lifted into columns for the identity lookups used by delete
/// and sync. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                uid TEXT PRIMARY KEY,
                objtype TEXT NOT NULL,
                resourceid TEXT,
                attributes_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entities_identity
                ON entities(objtype, resourceid);

            CREATE TABLE IF NOT EXISTS predicates (
                name TEXT PRIMARY KEY,
                value_type TEXT NOT NULL,
                indexed INTEGER NOT NULL,
                list INTEGER NOT NULL
            );

            -- WAL so readers are not blocked by background sync writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn parse_attributes(json: &str) -> StorageResult<Map<String, Value>> {
        match serde_json::from_str(json)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Malformed(format!(
                "entity attributes are not an object: {}",
                other
            ))),
        }
    }

    fn row_to_predicate(
        name: String,
        value_type: String,
        indexed: bool,
        list: bool,
    ) -> StorageResult<Predicate> {
        let value_type = ValueType::parse(&value_type).ok_or_else(|| {
            StorageError::Malformed(format!("unknown value type '{}' for {}", value_type, name))
        })?;
        Ok(Predicate {
            name,
            value_type,
            index: indexed,
            list,
        })
    }

    /// Replace the stored document and its lifted columns.
    fn write_attributes(
        conn: &Connection,
        uid: &Uid,
        attributes: &Map<String, Value>,
    ) -> StorageResult<()> {
        let entity = Entity::from_map(attributes.clone());
        conn.execute(
            "UPDATE entities SET objtype = ?2, resourceid = ?3, attributes_json = ?4, updated_at = ?5
             WHERE uid = ?1",
            params![
                uid.as_str(),
                entity.objtype().unwrap_or_default(),
                entity.resource_id(),
                serde_json::to_string(attributes)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert(conn: &Connection, entity: &Entity) -> StorageResult<Uid> {
        let uid = Uid::generate();
        let mut attributes = entity.attributes().clone();
        attributes.insert(attr::UID.to_string(), Value::String(uid.to_string()));
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO entities (uid, objtype, resourceid, attributes_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                uid.as_str(),
                entity.objtype().unwrap_or_default(),
                entity.resource_id(),
                serde_json::to_string(&attributes)?,
                now,
            ],
        )?;
        Ok(uid)
    }

    fn load_attributes(conn: &Connection, uid: &Uid) -> StorageResult<Option<Map<String, Value>>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT attributes_json FROM entities WHERE uid = ?1",
                params![uid.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| Self::parse_attributes(&j)).transpose()
    }

    fn lookup_resource_id(
        conn: &Connection,
        objtype: &str,
        resource_id: &str,
    ) -> StorageResult<Option<Uid>> {
        let uid: Option<String> = conn
            .query_row(
                "SELECT uid FROM entities WHERE objtype = ?1 AND resourceid = ?2
                 ORDER BY rowid LIMIT 1",
                params![objtype, resource_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(uid.map(Uid::from))
    }

    /// Number of stored entities
    pub fn entity_count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl GraphStore for SqliteStore {
    fn create(&self, entity: &Entity) -> StorageResult<Uid> {
        let conn = self.conn.lock().unwrap();
        let uid = Self::insert(&conn, entity)?;
        tracing::debug!(uid = %uid, objtype = entity.objtype().unwrap_or_default(), "entity created");
        Ok(uid)
    }

    fn update(&self, uid: &Uid, attributes: &Map<String, Value>) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let Some(current) = Self::load_attributes(&conn, uid)? else {
            return Ok(false);
        };

        let mut entity = Entity::from_map(current);
        entity.merge(attributes.clone());
        entity.insert(attr::UID, uid.as_str());
        Self::write_attributes(&conn, uid, entity.attributes())?;
        tracing::debug!(uid = %uid, fields = attributes.len(), "entity updated");
        Ok(true)
    }

    fn delete(&self, uid: &Uid) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM entities WHERE uid = ?1", params![uid.as_str()])?;
        Ok(rows > 0)
    }

    fn get(&self, uid: &Uid) -> StorageResult<Option<Entity>> {
        let conn = self.conn.lock().unwrap();
        Ok(Self::load_attributes(&conn, uid)?.map(Entity::from_map))
    }

    fn find_by_resource_id(&self, objtype: &str, resource_id: &str) -> StorageResult<Option<Uid>> {
        let conn = self.conn.lock().unwrap();
        Self::lookup_resource_id(&conn, objtype, resource_id)
    }

    /// Lookup and write happen under one lock, so concurrent syncs of the
    /// same object cannot both insert.
    fn upsert(&self, entity: &Entity) -> StorageResult<Uid> {
        let conn = self.conn.lock().unwrap();
        let objtype = entity.objtype().unwrap_or_default();
        let existing = match entity.resource_id() {
            Some(rid) => Self::lookup_resource_id(&conn, objtype, rid)?,
            None => None,
        };
        match existing {
            Some(uid) => {
                let mut attributes = entity.attributes().clone();
                attributes.insert(attr::UID.to_string(), Value::String(uid.to_string()));
                Self::write_attributes(&conn, &uid, &attributes)?;
                Ok(uid)
            }
            None => Self::insert(&conn, entity),
        }
    }

    fn execute_query(&self, query: &CompiledQuery) -> StorageResult<QueryRows> {
        let rendered = render(query);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&rendered.sql)?;
        let params = rendered.param_refs();

        match query.projection {
            Projection::Count => {
                let count: i64 = stmt.query_row(params.as_slice(), |row| row.get(0))?;
                Ok(QueryRows::Count(count as u64))
            }
            Projection::Page { .. } => {
                let rows = stmt.query_map(params.as_slice(), |row| row.get::<_, String>(0))?;
                let mut entities = Vec::new();
                for row in rows {
                    entities.push(Entity::from_map(Self::parse_attributes(&row?)?));
                }
                Ok(QueryRows::Entities(entities))
            }
        }
    }
}

impl SchemaStore for SqliteStore {
    fn upsert_predicate(&self, predicate: &Predicate) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO predicates (name, value_type, indexed, list)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                value_type = excluded.value_type,
                indexed = excluded.indexed,
                list = excluded.list
            "#,
            params![
                predicate.name,
                predicate.value_type.as_str(),
                predicate.index,
                predicate.list
            ],
        )?;
        Ok(())
    }

    fn drop_predicate(&self, name: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute("DELETE FROM predicates WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    fn get_predicate(&self, name: &str) -> StorageResult<Option<Predicate>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, bool, bool)> = conn
            .query_row(
                "SELECT name, value_type, indexed, list FROM predicates WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        match row {
            Some((name, value_type, indexed, list)) => {
                Ok(Some(Self::row_to_predicate(name, value_type, indexed, list)?))
            }
            None => Ok(None),
        }
    }

    fn list_predicates(&self) -> StorageResult<Vec<Predicate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT name, value_type, indexed, list FROM predicates ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut predicates = Vec::new();
        for row in rows {
            let (name, value_type, indexed, list) = row?;
            predicates.push(Self::row_to_predicate(name, value_type, indexed, list)?);
        }
        Ok(predicates)
    }

    fn resolve_field_metadata(&self, names: &[String]) -> StorageResult<Vec<Option<Predicate>>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            resolved.push(self.get_predicate(name)?);
        }
        Ok(resolved)
    }
}
