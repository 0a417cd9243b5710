//! Relationship store: typed directed edges between entities.
//!
//! # Responsibility
//! - Persist and query edges from either endpoint.
//! - Replace exclusive edges (single owner) as one unit.
//!
//! # Invariants
//! - Lookups return edges in insertion order.
//! - Writing an edge that already exists is a no-op.
//! - `replace_exclusive_edge` never exposes zero or two edges to readers
//!   on other connections.

use crate::model::reference::{EntityId, EntityKind};
use crate::model::relationship::{Direction, EdgeQuery, EdgeRecord, Relationship};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_store::{parse_kind, parse_uuid, CatalogStore, SqliteCatalogStore};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

/// Directed edge storage.
pub trait RelationshipStore {
    /// Writes one edge; returns `false` when it was already present.
    fn put_edge(&self, edge: &EdgeRecord) -> RepoResult<bool>;
    /// Deletes one edge; returns whether it existed.
    fn delete_edge(&self, edge: &EdgeRecord) -> RepoResult<bool>;
    /// Deletes every edge matched by `query`.
    fn delete_edges(&self, query: &EdgeQuery) -> RepoResult<usize>;
    /// Finds every edge matched by `query`, oldest first.
    fn find_edges(&self, query: &EdgeQuery) -> RepoResult<Vec<EdgeRecord>>;
    /// Replaces all edges matched by `query` with at most one edge to `related`.
    fn replace_exclusive_edge(
        &self,
        query: &EdgeQuery,
        related: Option<(EntityId, EntityKind)>,
    ) -> RepoResult<()>;
    /// Deletes every edge touching the entity at either end.
    fn delete_all_edges(&self, id: EntityId, kind: EntityKind) -> RepoResult<usize>;
}

impl RelationshipStore for SqliteCatalogStore<'_> {
    fn put_edge(&self, edge: &EdgeRecord) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT INTO entity_relationships (
                from_id, from_kind, relation, to_id, to_kind
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(from_id, from_kind, relation, to_id, to_kind) DO NOTHING;",
            params![
                edge.from_id.to_string(),
                edge.from_kind.as_str(),
                edge.relationship.as_str(),
                edge.to_id.to_string(),
                edge.to_kind.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_edge(&self, edge: &EdgeRecord) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM entity_relationships
             WHERE from_id = ?1
               AND from_kind = ?2
               AND relation = ?3
               AND to_id = ?4
               AND to_kind = ?5;",
            params![
                edge.from_id.to_string(),
                edge.from_kind.as_str(),
                edge.relationship.as_str(),
                edge.to_id.to_string(),
                edge.to_kind.as_str(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_edges(&self, query: &EdgeQuery) -> RepoResult<usize> {
        let (filter, bind_values) = edge_filter(query);
        let changed = self.conn.execute(
            &format!("DELETE FROM entity_relationships WHERE {filter};"),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }

    fn find_edges(&self, query: &EdgeQuery) -> RepoResult<Vec<EdgeRecord>> {
        let (filter, bind_values) = edge_filter(query);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT from_id, from_kind, relation, to_id, to_kind
             FROM entity_relationships
             WHERE {filter}
             ORDER BY seq ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }
        Ok(edges)
    }

    fn replace_exclusive_edge(
        &self,
        query: &EdgeQuery,
        related: Option<(EntityId, EntityKind)>,
    ) -> RepoResult<()> {
        self.in_transaction(|| {
            let current = self.find_edges(query)?;
            let anchor = (query.anchor_id, query.anchor_kind);
            let already_current = match (related, current.as_slice()) {
                (Some(target), [only]) => only.related(query.direction) == target,
                (None, []) => true,
                _ => false,
            };
            if already_current {
                return Ok(());
            }

            self.delete_edges(query)?;
            if let Some(target) = related {
                let edge =
                    EdgeRecord::between(anchor, query.relationship, target, query.direction);
                self.put_edge(&edge)?;
            }
            Ok(())
        })
    }

    fn delete_all_edges(&self, id: EntityId, kind: EntityKind) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM entity_relationships
             WHERE (from_id = ?1 AND from_kind = ?2)
                OR (to_id = ?1 AND to_kind = ?2);",
            params![id.to_string(), kind.as_str()],
        )?;
        Ok(changed)
    }
}

fn edge_filter(query: &EdgeQuery) -> (String, Vec<Value>) {
    let (anchor_columns, related_kind_column) = match query.direction {
        Direction::Outgoing => ("from_id = ? AND from_kind = ?", "to_kind"),
        Direction::Incoming => ("to_id = ? AND to_kind = ?", "from_kind"),
    };

    let mut filter = format!("{anchor_columns} AND relation = ?");
    let mut bind_values = vec![
        Value::Text(query.anchor_id.to_string()),
        Value::Text(query.anchor_kind.as_str().to_string()),
        Value::Text(query.relationship.as_str().to_string()),
    ];

    if let Some(kind) = query.related_kind {
        filter.push_str(&format!(" AND {related_kind_column} = ?"));
        bind_values.push(Value::Text(kind.as_str().to_string()));
    }

    (filter, bind_values)
}

fn parse_edge_row(row: &Row<'_>) -> RepoResult<EdgeRecord> {
    let from_id: String = row.get("from_id")?;
    let from_kind: String = row.get("from_kind")?;
    let relation: String = row.get("relation")?;
    let to_id: String = row.get("to_id")?;
    let to_kind: String = row.get("to_kind")?;

    Ok(EdgeRecord {
        from_id: parse_uuid(&from_id, "entity_relationships.from_id")?,
        from_kind: parse_kind(&from_kind, "entity_relationships.from_kind")?,
        relationship: Relationship::parse(&relation).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid relation `{relation}` in entity_relationships.relation"
            ))
        })?,
        to_id: parse_uuid(&to_id, "entity_relationships.to_id")?,
        to_kind: parse_kind(&to_kind, "entity_relationships.to_kind")?,
    })
}
