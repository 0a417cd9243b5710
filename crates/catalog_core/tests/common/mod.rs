#![allow(dead_code)]

use catalog_core::{EntityKind, EntityReference, RecordStore, StoredRecord};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Inserts a bare record of a kind this crate only links to.
pub fn seed(store: &impl RecordStore, kind: EntityKind, name: &str) -> EntityReference {
    let id = Uuid::new_v4();
    store
        .put(
            &StoredRecord {
                id,
                kind,
                name: name.to_string(),
                fqn: name.to_string(),
                json: json!({ "id": id, "name": name }).to_string(),
                version: 0.1,
                deleted: false,
                updated_at: 0,
            },
            false,
        )
        .unwrap();
    EntityReference::new(id, kind)
}

pub fn count_edges(conn: &Connection, relation: &str, to_id: Uuid) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM entity_relationships WHERE relation = ?1 AND to_id = ?2;",
        rusqlite::params![relation, to_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn ids(refs: &[EntityReference]) -> Vec<Uuid> {
    refs.iter().map(|reference| reference.id).collect()
}
