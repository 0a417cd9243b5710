//! Record store: entity payloads keyed by kind and id.
//!
//! # Invariants
//! - Inserts never overwrite an existing id or fully qualified name.
//! - Stored JSON is whatever the repository handed in; this layer does not
//!   inspect payload contents.

use crate::model::reference::{EntityId, EntityKind};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_store::{bool_to_int, parse_kind, parse_uuid, SqliteCatalogStore};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, ErrorCode, Row};

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    kind,
    name,
    fqn,
    json,
    version,
    deleted,
    updated_at
FROM entity_records";

/// One persisted entity payload with its index columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub fqn: String,
    /// Serialized storage view; never contains relational fields.
    pub json: String,
    pub version: f64,
    pub deleted: bool,
    pub updated_at: i64,
}

/// Listing options for one entity kind.
#[derive(Debug, Clone)]
pub struct RecordListQuery {
    pub kind: EntityKind,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl RecordListQuery {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            include_deleted: false,
            limit: None,
            offset: 0,
        }
    }
}

/// Keyed payload storage.
pub trait RecordStore {
    /// Inserts (`overwrite = false`) or upserts (`overwrite = true`) a record.
    fn put(&self, record: &StoredRecord, overwrite: bool) -> RepoResult<()>;
    fn get(&self, kind: EntityKind, id: EntityId) -> RepoResult<Option<StoredRecord>>;
    fn get_by_fqn(&self, kind: EntityKind, fqn: &str) -> RepoResult<Option<StoredRecord>>;
    /// Lists records ordered by fully qualified name.
    fn list(&self, query: &RecordListQuery) -> RepoResult<Vec<StoredRecord>>;
    /// Removes a record; returns whether one existed.
    fn delete(&self, kind: EntityKind, id: EntityId) -> RepoResult<bool>;
}

impl RecordStore for SqliteCatalogStore<'_> {
    fn put(&self, record: &StoredRecord, overwrite: bool) -> RepoResult<()> {
        let sql = if overwrite {
            "INSERT INTO entity_records (
                id, kind, name, fqn, json, version, deleted, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(kind, id) DO UPDATE SET
                name = excluded.name,
                fqn = excluded.fqn,
                json = excluded.json,
                version = excluded.version,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at;"
        } else {
            "INSERT INTO entity_records (
                id, kind, name, fqn, json, version, deleted, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);"
        };

        let result = self.conn.execute(
            sql,
            params![
                record.id.to_string(),
                record.kind.as_str(),
                record.name.as_str(),
                record.fqn.as_str(),
                record.json.as_str(),
                record.version,
                bool_to_int(record.deleted),
                record.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) => Err(map_put_error(err, record)),
        }
    }

    fn get(&self, kind: EntityKind, id: EntityId) -> RepoResult<Option<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE kind = ?1
               AND id = ?2;"
        ))?;
        let mut rows = stmt.query(params![kind.as_str(), id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn get_by_fqn(&self, kind: EntityKind, fqn: &str) -> RepoResult<Option<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE kind = ?1
               AND fqn = ?2;"
        ))?;
        let mut rows = stmt.query(params![kind.as_str(), fqn])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn list(&self, query: &RecordListQuery) -> RepoResult<Vec<StoredRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE kind = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(query.kind.as_str().to_string())];

        if !query.include_deleted {
            sql.push_str(" AND deleted = 0");
        }

        sql.push_str(" ORDER BY fqn ASC, id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn delete(&self, kind: EntityKind, id: EntityId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM entity_records WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

fn map_put_error(err: rusqlite::Error, record: &StoredRecord) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return RepoError::AlreadyExists {
                        kind: record.kind,
                        key: record.id.to_string(),
                    };
                }
                ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    return RepoError::AlreadyExists {
                        kind: record.kind,
                        key: record.fqn.clone(),
                    };
                }
                _ => {}
            }
        }
    }
    err.into()
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<StoredRecord> {
    let id_text: String = row.get("id")?;
    let kind_text: String = row.get("kind")?;
    let deleted = match row.get::<_, i64>("deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid deleted value `{other}` in entity_records.deleted"
            )));
        }
    };

    Ok(StoredRecord {
        id: parse_uuid(&id_text, "entity_records.id")?,
        kind: parse_kind(&kind_text, "entity_records.kind")?,
        name: row.get("name")?,
        fqn: row.get("fqn")?,
        json: row.get("json")?,
        version: row.get("version")?,
        deleted,
        updated_at: row.get("updated_at")?,
    })
}
