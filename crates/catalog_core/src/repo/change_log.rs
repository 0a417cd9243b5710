//! Version history and change-event persistence.
//!
//! # Invariants
//! - A version snapshot is written once, when that version is superseded.
//! - Change events are append-only and listed in commit order.

use crate::model::change::{ChangeDescription, ChangeEvent, ChangeEventType};
use crate::model::reference::{EntityId, EntityKind};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_store::{parse_kind, parse_uuid, SqliteCatalogStore};
use rusqlite::{params, OptionalExtension, Row};

/// Stored payload of one superseded version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionSnapshot {
    pub version: f64,
    pub json: String,
}

/// Audit sink for the change recorder.
pub trait ChangeLogStore {
    fn put_version(&self, kind: EntityKind, id: EntityId, snapshot: &VersionSnapshot)
        -> RepoResult<()>;
    fn get_version(
        &self,
        kind: EntityKind,
        id: EntityId,
        version: f64,
    ) -> RepoResult<Option<VersionSnapshot>>;
    /// Snapshots ordered by ascending version.
    fn list_versions(&self, kind: EntityKind, id: EntityId) -> RepoResult<Vec<VersionSnapshot>>;
    fn delete_versions(&self, kind: EntityKind, id: EntityId) -> RepoResult<usize>;
    fn append_event(&self, event: &ChangeEvent) -> RepoResult<()>;
    /// Events of one entity in commit order.
    fn list_events(&self, kind: EntityKind, id: EntityId) -> RepoResult<Vec<ChangeEvent>>;
}

impl ChangeLogStore for SqliteCatalogStore<'_> {
    fn put_version(
        &self,
        kind: EntityKind,
        id: EntityId,
        snapshot: &VersionSnapshot,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO entity_versions (id, kind, version, json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(kind, id, version) DO UPDATE SET json = excluded.json;",
            params![
                id.to_string(),
                kind.as_str(),
                snapshot.version,
                snapshot.json.as_str()
            ],
        )?;
        Ok(())
    }

    fn get_version(
        &self,
        kind: EntityKind,
        id: EntityId,
        version: f64,
    ) -> RepoResult<Option<VersionSnapshot>> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT version, json
                 FROM entity_versions
                 WHERE kind = ?1
                   AND id = ?2
                   AND ABS(version - ?3) < 0.0001;",
                params![kind.as_str(), id.to_string(), version],
                |row| {
                    Ok(VersionSnapshot {
                        version: row.get(0)?,
                        json: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(snapshot)
    }

    fn list_versions(&self, kind: EntityKind, id: EntityId) -> RepoResult<Vec<VersionSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT version, json
             FROM entity_versions
             WHERE kind = ?1
               AND id = ?2
             ORDER BY version ASC;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), id.to_string()])?;
        let mut snapshots = Vec::new();
        while let Some(row) = rows.next()? {
            snapshots.push(VersionSnapshot {
                version: row.get(0)?,
                json: row.get(1)?,
            });
        }
        Ok(snapshots)
    }

    fn delete_versions(&self, kind: EntityKind, id: EntityId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM entity_versions WHERE kind = ?1 AND id = ?2;",
            params![kind.as_str(), id.to_string()],
        )?;
        Ok(changed)
    }

    fn append_event(&self, event: &ChangeEvent) -> RepoResult<()> {
        let description = event
            .change_description
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO entity_change_events (
                entity_id,
                entity_kind,
                event_type,
                previous_version,
                current_version,
                user_name,
                timestamp,
                change_description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                event.entity_id.to_string(),
                event.entity_kind.as_str(),
                event.event_type.as_str(),
                event.previous_version,
                event.current_version,
                event.user_name.as_str(),
                event.timestamp,
                description,
            ],
        )?;
        Ok(())
    }

    fn list_events(&self, kind: EntityKind, id: EntityId) -> RepoResult<Vec<ChangeEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                entity_id,
                entity_kind,
                event_type,
                previous_version,
                current_version,
                user_name,
                timestamp,
                change_description
             FROM entity_change_events
             WHERE entity_kind = ?1
               AND entity_id = ?2
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![kind.as_str(), id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<ChangeEvent> {
    let entity_id: String = row.get("entity_id")?;
    let entity_kind: String = row.get("entity_kind")?;
    let event_type: String = row.get("event_type")?;
    let description: Option<String> = row.get("change_description")?;

    Ok(ChangeEvent {
        event_type: ChangeEventType::parse(&event_type).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid event type `{event_type}` in entity_change_events.event_type"
            ))
        })?,
        entity_id: parse_uuid(&entity_id, "entity_change_events.entity_id")?,
        entity_kind: parse_kind(&entity_kind, "entity_change_events.entity_kind")?,
        previous_version: row.get("previous_version")?,
        current_version: row.get("current_version")?,
        user_name: row.get("user_name")?,
        timestamp: row.get("timestamp")?,
        change_description: description
            .map(|value| serde_json::from_str::<ChangeDescription>(&value))
            .transpose()?,
    })
}
