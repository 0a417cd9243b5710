//! Generic entity repository.
//!
//! # Responsibility
//! - Drive prepare, store, read and delete for one entity kind.
//! - Keep relational values out of payloads and in the relationship store.
//! - Resolve requested relational fields on read.
//!
//! # Invariants
//! - Stored payloads never contain relational field keys.
//! - Callers' entities are only borrowed; the storage view is a separate value.
//! - Payload, edges, history and change event of one write commit together.

use crate::model::change::{next_version, ChangeDescription, ChangeEvent, ChangeEventType};
use crate::model::change::{same_version, INITIAL_VERSION};
use crate::model::entity::{inverse_field, CatalogEntity, ChangeStamp};
use crate::model::fields::{Cardinality, EdgeWrite, FieldSelection, RelationalField};
use crate::model::reference::{EntityId, EntityKind, EntityReference};
use crate::model::relationship::{EdgeQuery, EdgeRecord};
use crate::naming::{DefaultNamingService, NamingService};
use crate::repo::change_log::VersionSnapshot;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::record_store::{RecordListQuery, StoredRecord};
use crate::repo::sqlite_store::CatalogStore;
use crate::repo::updater::TrackedFieldsProvider;
use chrono::Utc;
use log::{error, info};
use serde_json::Value;
use std::time::Instant;

/// Paging options for listing one kind.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Persistence driver for entity kind `E` over store `S`.
pub struct EntityRepository<'s, E: CatalogEntity, S: CatalogStore> {
    store: &'s S,
    naming: Box<dyn NamingService>,
    tracked: Box<dyn TrackedFieldsProvider<E>>,
}

impl<'s, E: CatalogEntity, S: CatalogStore> EntityRepository<'s, E, S> {
    /// Creates a repository using dot-separated FQNs.
    pub fn new(store: &'s S, tracked: impl TrackedFieldsProvider<E> + 'static) -> Self {
        Self {
            store,
            naming: Box::new(DefaultNamingService),
            tracked: Box::new(tracked),
        }
    }

    /// Replaces the naming service.
    pub fn with_naming(mut self, naming: impl NamingService + 'static) -> Self {
        self.naming = Box::new(naming);
        self
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub(crate) fn tracked(&self) -> &dyn TrackedFieldsProvider<E> {
        self.tracked.as_ref()
    }

    /// Every relational field of `E`; the selection updates load.
    pub fn update_fields(&self) -> FieldSelection {
        FieldSelection::all(E::relational_fields())
    }

    /// Parses a comma separated field list against `E`'s field table.
    pub fn parse_fields(&self, input: &str) -> RepoResult<FieldSelection> {
        FieldSelection::parse(input, E::relational_fields())
            .map_err(|source| RepoError::InvalidField { kind: E::KIND, source })
    }

    /// Derives and assigns the fully qualified name.
    ///
    /// # Errors
    /// - `InvalidName` when the name violates the grammar.
    /// - `NotFound` when the namespace parent does not exist.
    pub fn prepare(&self, entity: &mut E) -> RepoResult<()> {
        let parent_fqn = match entity.namespace_parent().cloned() {
            Some(parent) => Some(self.load_target(&parent)?.fqn),
            None => None,
        };
        let fqn = self
            .naming
            .fully_qualified_name(entity.name(), parent_fqn.as_deref())
            .map_err(|source| RepoError::InvalidName {
                kind: E::KIND,
                source,
            })?;
        entity.set_fully_qualified_name(fqn);
        Ok(())
    }

    /// Writes the payload of a prepared entity.
    ///
    /// # Errors
    /// - `AlreadyExists` when inserting (`is_update = false`) over an
    ///   existing id or fully qualified name.
    pub fn store_entity(&self, entity: &E, is_update: bool) -> RepoResult<()> {
        let record = to_record(entity)?;
        self.store.put(&record, is_update)
    }

    /// Writes owner and create-time edges for the loaded relational fields.
    ///
    /// Fields left `NotRequested` are not touched.
    pub fn store_relationships(&self, entity: &E, is_update: bool) -> RepoResult<()> {
        let view = serde_json::to_value(entity)?;
        for field in E::relational_fields() {
            let Some(targets) = loaded_refs(&view, field)? else {
                continue;
            };
            match field.write {
                EdgeWrite::Exclusive => {
                    let target = targets.first();
                    if let Some(target) = target {
                        self.check_target(field, target)?;
                    }
                    self.store.replace_exclusive_edge(
                        &edge_query(entity.id(), E::KIND, field),
                        target.map(|target| (target.id, target.kind)),
                    )?;
                }
                EdgeWrite::Fixed if !is_update => {
                    for target in &targets {
                        self.check_target(field, target)?;
                        self.store
                            .put_edge(&edge_between(entity.id(), E::KIND, field, target))?;
                    }
                }
                EdgeWrite::Fixed | EdgeWrite::Synced | EdgeWrite::ReadOnly => {}
            }
        }
        Ok(())
    }

    /// Makes the edge set of every loaded synced field match its value,
    /// including its order.
    ///
    /// # Errors
    /// - `InvalidReference` when a target is already held by another entity
    ///   through a single-valued field, or when dropping a target would leave
    ///   its FQN naming a parent that no edge backs.
    pub fn sync_related_edges(&self, entity: &E) -> RepoResult<()> {
        let view = serde_json::to_value(entity)?;
        for field in E::relational_fields() {
            if field.write != EdgeWrite::Synced {
                continue;
            }
            let Some(targets) = loaded_refs(&view, field)? else {
                continue;
            };

            let mut wanted: Vec<(EntityId, EntityKind)> = Vec::new();
            for target in &targets {
                self.check_target(field, target)?;
                self.check_unclaimed(entity, field, target)?;
                if !wanted.contains(&(target.id, target.kind)) {
                    wanted.push((target.id, target.kind));
                }
            }

            let mut kept = Vec::new();
            for edge in self.store.find_edges(&edge_query(entity.id(), E::KIND, field))? {
                let related = edge.related(field.direction);
                if wanted.contains(&related) {
                    kept.push(edge);
                } else {
                    self.check_detachable(entity, field, related)?;
                    self.store.delete_edge(&edge)?;
                }
            }

            // Reads follow insertion order, so kept edges must form a prefix.
            let in_order = kept
                .iter()
                .map(|edge| edge.related(field.direction))
                .eq(wanted.iter().take(kept.len()).copied());
            if !in_order {
                for edge in &kept {
                    self.store.delete_edge(edge)?;
                }
                kept.clear();
            }
            for related in wanted.iter().skip(kept.len()) {
                self.store.put_edge(&EdgeRecord::between(
                    (entity.id(), E::KIND),
                    field.relationship,
                    *related,
                    field.direction,
                ))?;
            }
        }
        Ok(())
    }

    /// Resolves the references behind one relational field.
    ///
    /// # Errors
    /// - `AmbiguousRelationship` when a single-valued field has several edges.
    /// - `NotFound` when an edge points at a missing record.
    pub fn resolve_related_refs(
        &self,
        id: EntityId,
        field: &RelationalField,
    ) -> RepoResult<Vec<EntityReference>> {
        let related: Vec<(EntityId, EntityKind)> = self
            .store
            .find_edges(&edge_query(id, E::KIND, field))?
            .into_iter()
            .map(|edge| edge.related(field.direction))
            .filter(|(_, kind)| field.allows_kind(*kind))
            .collect();

        if field.cardinality == Cardinality::One && related.len() > 1 {
            return Err(RepoError::AmbiguousRelationship {
                kind: E::KIND,
                id: id.to_string(),
                field: field.selector,
                relationship: field.relationship,
                found: related.len(),
            });
        }

        related
            .into_iter()
            .map(|(related_id, related_kind)| -> RepoResult<EntityReference> {
                let record = self.load_target(&EntityReference::new(related_id, related_kind))?;
                Ok(EntityReference {
                    id: record.id,
                    kind: record.kind,
                    name: Some(record.name),
                    fully_qualified_name: Some(record.fqn),
                    deleted: record.deleted,
                })
            })
            .collect()
    }

    /// Attaches requested relational fields and clears the rest.
    ///
    /// # Errors
    /// - `NotFound` when the entity record no longer exists.
    pub fn set_fields(&self, entity: E, selection: &FieldSelection) -> RepoResult<E> {
        if self.store.get(E::KIND, entity.id())?.is_none() {
            return Err(RepoError::not_found(E::KIND, entity.id()));
        }

        let mut view = serde_json::to_value(&entity)?;
        let map = view.as_object_mut().ok_or_else(|| {
            RepoError::InvalidData(format!("{} {} is not a JSON object", E::KIND, entity.id()))
        })?;
        for field in E::relational_fields() {
            if !selection.contains(field.selector) {
                map.remove(field.json_key);
                continue;
            }
            let refs = self.resolve_related_refs(entity.id(), field)?;
            let value = match field.cardinality {
                Cardinality::One => match refs.into_iter().next() {
                    Some(reference) => serde_json::to_value(reference)?,
                    None => Value::Null,
                },
                Cardinality::Many => serde_json::to_value(refs)?,
            };
            map.insert(field.json_key.to_string(), value);
        }
        Ok(serde_json::from_value(view)?)
    }

    /// Creates `entity` and returns it re-read with the fields it carried.
    ///
    /// # Errors
    /// - `InvalidName`, `AlreadyExists`, `InvalidReference`, `NotFound`
    ///   (missing edge target) or `StoreUnavailable`; nothing is written then.
    pub fn create(&self, entity: &E, actor: &str) -> RepoResult<E> {
        let started_at = Instant::now();
        let mut prepared = entity.clone();
        let result = self.create_prepared(&mut prepared, actor);
        log_write("entity_create", E::KIND, prepared.id(), started_at, &result);
        result?;

        let selection = loaded_selection(&prepared)?;
        self.get(prepared.id(), &selection, false)
    }

    fn create_prepared(&self, entity: &mut E, actor: &str) -> RepoResult<()> {
        self.prepare(entity)?;
        entity.set_deleted(false);
        entity.apply_stamp(ChangeStamp {
            version: INITIAL_VERSION,
            updated_at: now_epoch_ms(),
            updated_by: actor.to_string(),
            change_description: None,
        });

        let entity = &*entity;
        self.store.in_transaction(|| {
            self.store_entity(entity, false)?;
            self.store_relationships(entity, false)?;
            self.sync_related_edges(entity)?;
            self.store.append_event(&ChangeEvent {
                event_type: ChangeEventType::EntityCreated,
                entity_id: entity.id(),
                entity_kind: E::KIND,
                previous_version: None,
                current_version: entity.version(),
                user_name: actor.to_string(),
                timestamp: entity.updated_at(),
                change_description: None,
            })
        })
    }

    /// Loads one entity by id with `fields` resolved.
    pub fn get(
        &self,
        id: EntityId,
        fields: &FieldSelection,
        include_deleted: bool,
    ) -> RepoResult<E> {
        let record = self.load_record(id, include_deleted)?;
        self.set_fields(decode(&record.json)?, fields)
    }

    /// Loads one entity by fully qualified name with `fields` resolved.
    pub fn get_by_name(
        &self,
        fqn: &str,
        fields: &FieldSelection,
        include_deleted: bool,
    ) -> RepoResult<E> {
        let record = self
            .store
            .get_by_fqn(E::KIND, fqn)?
            .filter(|record| include_deleted || !record.deleted)
            .ok_or_else(|| RepoError::not_found(E::KIND, fqn))?;
        self.set_fields(decode(&record.json)?, fields)
    }

    /// Lists entities ordered by fully qualified name.
    pub fn list(&self, fields: &FieldSelection, params: &ListParams) -> RepoResult<Vec<E>> {
        let query = RecordListQuery {
            kind: E::KIND,
            include_deleted: params.include_deleted,
            limit: params.limit,
            offset: params.offset,
        };
        self.store
            .list(&query)?
            .iter()
            .map(|record| -> RepoResult<E> { self.set_fields(decode(&record.json)?, fields) })
            .collect()
    }

    /// Deletes an entity.
    ///
    /// Soft delete tombstones the payload and keeps edges so the entity can be
    /// restored. Hard delete removes payload, history and every edge touching
    /// the entity.
    pub fn delete(&self, id: EntityId, hard: bool, actor: &str) -> RepoResult<()> {
        let started_at = Instant::now();
        let (event, result) = if hard {
            ("entity_hard_delete", self.hard_delete(id, actor))
        } else {
            ("entity_soft_delete", self.soft_delete(id, actor))
        };
        log_write(event, E::KIND, id, started_at, &result);
        result
    }

    fn hard_delete(&self, id: EntityId, actor: &str) -> RepoResult<()> {
        let record = self.load_record(id, true)?;
        self.store.in_transaction(|| {
            self.store.delete_all_edges(id, E::KIND)?;
            self.store.delete_versions(E::KIND, id)?;
            self.store.delete(E::KIND, id)?;
            self.store.append_event(&ChangeEvent {
                event_type: ChangeEventType::EntityDeleted,
                entity_id: id,
                entity_kind: E::KIND,
                previous_version: Some(record.version),
                current_version: record.version,
                user_name: actor.to_string(),
                timestamp: now_epoch_ms(),
                change_description: None,
            })
        })
    }

    fn soft_delete(&self, id: EntityId, actor: &str) -> RepoResult<()> {
        let record = self.load_record(id, false)?;
        self.flip_deleted(&record, true, ChangeEventType::EntitySoftDeleted, actor)
    }

    /// Brings back a soft-deleted entity. Restoring a live entity is a no-op.
    pub fn restore(&self, id: EntityId, actor: &str) -> RepoResult<E> {
        let started_at = Instant::now();
        let record = self.load_record(id, true)?;
        if record.deleted {
            let result =
                self.flip_deleted(&record, false, ChangeEventType::EntityRestored, actor);
            log_write("entity_restore", E::KIND, id, started_at, &result);
            result?;
        }
        self.get(id, &FieldSelection::none(), false)
    }

    fn flip_deleted(
        &self,
        record: &StoredRecord,
        deleted: bool,
        event_type: ChangeEventType,
        actor: &str,
    ) -> RepoResult<()> {
        let mut entity: E = decode(&record.json)?;
        entity.set_deleted(deleted);
        entity.apply_stamp(ChangeStamp {
            version: next_version(record.version),
            updated_at: now_epoch_ms(),
            updated_by: actor.to_string(),
            change_description: None,
        });
        self.persist_revision(record, &entity, event_type, None, actor)
    }

    /// Commits a new revision of an existing entity.
    ///
    /// `previous` is the record the revision was computed from; the write is
    /// rejected with `ConcurrentModification` if the stored version moved on.
    pub(crate) fn persist_revision(
        &self,
        previous: &StoredRecord,
        entity: &E,
        event_type: ChangeEventType,
        changes: Option<ChangeDescription>,
        actor: &str,
    ) -> RepoResult<()> {
        self.store.in_transaction(|| {
            let current = self
                .store
                .get(E::KIND, previous.id)?
                .ok_or_else(|| RepoError::not_found(E::KIND, previous.id))?;
            if !same_version(current.version, previous.version) {
                return Err(RepoError::ConcurrentModification {
                    kind: E::KIND,
                    id: previous.id.to_string(),
                    expected: previous.version,
                    actual: current.version,
                });
            }

            self.store.put_version(
                E::KIND,
                previous.id,
                &VersionSnapshot {
                    version: previous.version,
                    json: previous.json.clone(),
                },
            )?;
            self.store_entity(entity, true)?;
            self.store_relationships(entity, true)?;
            self.sync_related_edges(entity)?;
            self.store.append_event(&ChangeEvent {
                event_type,
                entity_id: previous.id,
                entity_kind: E::KIND,
                previous_version: Some(previous.version),
                current_version: entity.version(),
                user_name: actor.to_string(),
                timestamp: entity.updated_at(),
                change_description: changes,
            })
        })
    }

    /// Every stored revision, oldest first, ending with the current one.
    pub fn list_versions(&self, id: EntityId) -> RepoResult<Vec<E>> {
        let current = self.load_record(id, true)?;
        let mut versions = self
            .store
            .list_versions(E::KIND, id)?
            .iter()
            .map(|snapshot| decode(&snapshot.json))
            .collect::<RepoResult<Vec<E>>>()?;
        versions.push(decode(&current.json)?);
        Ok(versions)
    }

    /// Loads the payload of one revision; relational fields are not requested.
    pub fn get_version(&self, id: EntityId, version: f64) -> RepoResult<E> {
        let current = self.load_record(id, true)?;
        if same_version(current.version, version) {
            return decode(&current.json);
        }
        let snapshot = self
            .store
            .get_version(E::KIND, id, version)?
            .ok_or_else(|| RepoError::not_found(E::KIND, format!("{id}@{version:.1}")))?;
        decode(&snapshot.json)
    }

    /// Audit trail of one entity in commit order.
    pub fn list_change_events(&self, id: EntityId) -> RepoResult<Vec<ChangeEvent>> {
        self.store.list_events(E::KIND, id)
    }

    pub(crate) fn load_record(
        &self,
        id: EntityId,
        include_deleted: bool,
    ) -> RepoResult<StoredRecord> {
        self.store
            .get(E::KIND, id)?
            .filter(|record| include_deleted || !record.deleted)
            .ok_or_else(|| RepoError::not_found(E::KIND, id))
    }

    fn load_target(&self, reference: &EntityReference) -> RepoResult<StoredRecord> {
        self.store
            .get(reference.kind, reference.id)?
            .ok_or_else(|| RepoError::not_found(reference.kind, reference.id))
    }

    fn check_target(&self, field: &RelationalField, target: &EntityReference) -> RepoResult<()> {
        if !field.allows_kind(target.kind) {
            return Err(invalid_reference::<E>(field, (target.id, target.kind)));
        }
        self.load_target(target).map(|_| ())
    }

    /// Rejects `target` when its single-valued inverse field already points
    /// at another entity.
    fn check_unclaimed(
        &self,
        entity: &E,
        field: &RelationalField,
        target: &EntityReference,
    ) -> RepoResult<()> {
        let Some(inverse) = inverse_field(E::KIND, field, target.kind) else {
            return Ok(());
        };
        if inverse.cardinality != Cardinality::One {
            return Ok(());
        }
        let claimed = self
            .store
            .find_edges(&edge_query(target.id, target.kind, inverse))?
            .iter()
            .any(|edge| edge.related(inverse.direction) != (entity.id(), E::KIND));
        if claimed {
            return Err(invalid_reference::<E>(field, (target.id, target.kind)));
        }
        Ok(())
    }

    /// Rejects dropping `related` when its inverse link was fixed at creation
    /// and its FQN is derived from `entity`.
    fn check_detachable(
        &self,
        entity: &E,
        field: &RelationalField,
        related: (EntityId, EntityKind),
    ) -> RepoResult<()> {
        let Some(inverse) = inverse_field(E::KIND, field, related.1) else {
            return Ok(());
        };
        if inverse.write != EdgeWrite::Fixed {
            return Ok(());
        }
        let Some(record) = self.store.get(related.1, related.0)? else {
            return Ok(());
        };
        let namespaced = self
            .naming
            .fully_qualified_name(&record.name, entity.fully_qualified_name())
            .is_ok_and(|fqn| fqn == record.fqn);
        if namespaced {
            return Err(invalid_reference::<E>(field, related));
        }
        Ok(())
    }
}

/// Serialized entity with every relational key removed.
pub fn storage_view<E: CatalogEntity>(entity: &E) -> RepoResult<Value> {
    let mut view = serde_json::to_value(entity)?;
    if let Some(map) = view.as_object_mut() {
        for field in E::relational_fields() {
            map.remove(field.json_key);
        }
    }
    Ok(view)
}

/// References held by `field` in a serialized entity.
///
/// Returns `None` when the field is not requested (key absent).
pub(crate) fn loaded_refs(
    view: &Value,
    field: &RelationalField,
) -> RepoResult<Option<Vec<EntityReference>>> {
    let refs = match view.get(field.json_key) {
        None => return Ok(None),
        Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| serde_json::from_value(item.clone()))
            .collect::<Result<Vec<EntityReference>, _>>()?,
        Some(single) => vec![serde_json::from_value(single.clone())?],
    };
    Ok(Some(refs))
}

/// Selection naming the relational fields `entity` carries as loaded.
pub(crate) fn loaded_selection<E: CatalogEntity>(entity: &E) -> RepoResult<FieldSelection> {
    let view = serde_json::to_value(entity)?;
    let names: Vec<&str> = E::relational_fields()
        .iter()
        .filter(|field| view.get(field.json_key).is_some())
        .map(|field| field.selector)
        .collect();
    FieldSelection::of(&names, E::relational_fields())
        .map_err(|source| RepoError::InvalidField { kind: E::KIND, source })
}

pub(crate) fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn decode<E: CatalogEntity>(json: &str) -> RepoResult<E> {
    Ok(serde_json::from_str(json)?)
}

fn to_record<E: CatalogEntity>(entity: &E) -> RepoResult<StoredRecord> {
    let fqn = entity.fully_qualified_name().ok_or_else(|| {
        RepoError::InvalidData(format!(
            "{} {} has no fully qualified name",
            E::KIND,
            entity.id()
        ))
    })?;
    Ok(StoredRecord {
        id: entity.id(),
        kind: E::KIND,
        name: entity.name().to_string(),
        fqn: fqn.to_string(),
        json: serde_json::to_string(&storage_view(entity)?)?,
        version: entity.version(),
        deleted: entity.is_deleted(),
        updated_at: entity.updated_at(),
    })
}

fn invalid_reference<E: CatalogEntity>(
    field: &RelationalField,
    target: (EntityId, EntityKind),
) -> RepoError {
    RepoError::InvalidReference {
        kind: E::KIND,
        field: field.selector,
        target_kind: target.1,
        target_id: target.0.to_string(),
    }
}

fn edge_query(id: EntityId, kind: EntityKind, field: &RelationalField) -> EdgeQuery {
    EdgeQuery {
        anchor_id: id,
        anchor_kind: kind,
        relationship: field.relationship,
        related_kind: field.related_kind_filter(),
        direction: field.direction,
    }
}

fn edge_between(
    id: EntityId,
    kind: EntityKind,
    field: &RelationalField,
    target: &EntityReference,
) -> EdgeRecord {
    EdgeRecord::between(
        (id, kind),
        field.relationship,
        (target.id, target.kind),
        field.direction,
    )
}

pub(crate) fn log_write<T>(
    event: &'static str,
    kind: EntityKind,
    id: EntityId,
    started_at: Instant,
    result: &RepoResult<T>,
) {
    match result {
        Ok(_) => info!(
            "event={} module=repo status=ok kind={} id={} duration_ms={}",
            event,
            kind,
            id,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={} module=repo status=error kind={} id={} duration_ms={} error_code={}",
            event,
            kind,
            id,
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}
