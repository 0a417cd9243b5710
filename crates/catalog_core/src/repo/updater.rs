//! Entity update pipeline.
//!
//! # Responsibility
//! - Apply PUT and JSON merge PATCH operations to a stored entity.
//! - Record tracked field changes and decide whether anything changed.
//! - Commit the new revision with history and change event atomically.
//!
//! # Invariants
//! - `id`, `name`, `fullyQualifiedName` and fields fixed at creation never
//!   change through an update.
//! - An update with no tracked change writes nothing and keeps the version.
//! - Every committed update advances the version by exactly `0.1`.

use crate::model::change::{next_version, same_version, ChangeDescription, ChangeEventType};
use crate::model::change::FieldChange;
use crate::model::entity::{CatalogEntity, ChangeStamp, OWNER_FIELD};
use crate::model::fields::{Cardinality, EdgeWrite, RelationalField};
use crate::model::reference::{EntityId, EntityKind, EntityReference};
use crate::repo::entity_repo::{log_write, loaded_refs, now_epoch_ms, EntityRepository};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_store::CatalogStore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;

/// Plain attributes every kind tracks.
const COMMON_TRACKED_KEYS: &[&str] = &["description", "displayName"];

/// Requested change to an existing entity.
#[derive(Debug, Clone)]
pub enum UpdateOperation<E> {
    /// Full replacement; relational fields left `NotRequested` keep their
    /// stored value.
    Put(E),
    /// RFC 7386 merge patch over the stored JSON form. `null` on a relational
    /// key clears that relation.
    Patch(Value),
}

/// How an update call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome<E> {
    pub entity: E,
    pub status: UpdateStatus,
    pub changes: Option<ChangeDescription>,
}

/// Collects field changes of one update.
#[derive(Debug, Clone)]
pub struct ChangeRecorder {
    description: ChangeDescription,
}

impl ChangeRecorder {
    pub fn new(previous_version: f64) -> Self {
        Self {
            description: ChangeDescription {
                previous_version,
                ..ChangeDescription::default()
            },
        }
    }

    /// Records `field` if the serialized values differ; returns whether it did.
    pub fn record_change<T: Serialize + ?Sized>(
        &mut self,
        field: &str,
        original: &T,
        updated: &T,
    ) -> RepoResult<bool> {
        Ok(self.record_value(
            field,
            serde_json::to_value(original)?,
            serde_json::to_value(updated)?,
        ))
    }

    /// Records a reference-valued field, comparing targets by identity only.
    pub fn record_refs(
        &mut self,
        field: &str,
        original: &[EntityReference],
        updated: &[EntityReference],
        cardinality: Cardinality,
    ) -> RepoResult<bool> {
        let identity = |refs: &[EntityReference]| -> Vec<EntityReference> {
            refs.iter()
                .map(|reference| EntityReference::new(reference.id, reference.kind))
                .collect()
        };
        match cardinality {
            Cardinality::One => self.record_change(
                field,
                &identity(original).into_iter().next(),
                &identity(updated).into_iter().next(),
            ),
            Cardinality::Many => {
                self.record_change(field, &identity(original), &identity(updated))
            }
        }
    }

    pub fn record_value(&mut self, field: &str, original: Value, updated: Value) -> bool {
        if original == updated {
            return false;
        }
        let change = FieldChange {
            name: field.to_string(),
            old_value: original,
            new_value: updated,
        };
        match (is_empty_value(&change.old_value), is_empty_value(&change.new_value)) {
            (true, true) => return false,
            (true, false) => self.description.fields_added.push(change),
            (false, true) => self.description.fields_deleted.push(change),
            (false, false) => self.description.fields_updated.push(change),
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
    }

    pub fn finish(self) -> ChangeDescription {
        self.description
    }
}

/// Kind-specific change tracking plugged into the generic update routine.
pub trait TrackedFieldsProvider<E> {
    /// Records changes of fields beyond the common ones.
    fn entity_specific_update(
        &self,
        original: &E,
        updated: &E,
        recorder: &mut ChangeRecorder,
    ) -> RepoResult<()>;
}

/// Runs updates for one repository on behalf of `actor`.
pub struct EntityUpdater<'r, 's, E: CatalogEntity, S: CatalogStore> {
    repo: &'r EntityRepository<'s, E, S>,
    actor: String,
}

impl<'r, 's, E: CatalogEntity, S: CatalogStore> EntityUpdater<'r, 's, E, S> {
    pub fn new(repo: &'r EntityRepository<'s, E, S>, actor: impl Into<String>) -> Self {
        Self {
            repo,
            actor: actor.into(),
        }
    }

    /// Applies `operation` to the live entity `id`.
    ///
    /// # Errors
    /// - `NotFound` when the entity does not exist or is soft-deleted.
    /// - `ImmutableField` when the operation changes id, name or FQN.
    /// - `ConcurrentModification` when another writer committed first.
    pub fn update(
        &self,
        id: EntityId,
        operation: UpdateOperation<E>,
    ) -> RepoResult<UpdateOutcome<E>> {
        self.run(id, operation, None)
    }

    /// Like [`EntityUpdater::update`], but only when the stored version is
    /// still `expected_version`.
    pub fn update_if_version(
        &self,
        id: EntityId,
        operation: UpdateOperation<E>,
        expected_version: f64,
    ) -> RepoResult<UpdateOutcome<E>> {
        self.run(id, operation, Some(expected_version))
    }

    /// Creates `entity` when its FQN is unused, else replaces the stored one.
    pub fn create_or_update(&self, entity: &E) -> RepoResult<UpdateOutcome<E>> {
        let mut prepared = entity.clone();
        self.repo.prepare(&mut prepared)?;
        let fqn = prepared.fully_qualified_name().unwrap_or_default().to_string();

        let Some(existing) = self.repo.store().get_by_fqn(E::KIND, &fqn)? else {
            let created = self.repo.create(entity, &self.actor)?;
            return Ok(UpdateOutcome {
                entity: created,
                status: UpdateStatus::Created,
                changes: None,
            });
        };
        if existing.deleted {
            return Err(RepoError::AlreadyExists {
                kind: E::KIND,
                key: fqn,
            });
        }

        let mut view = serde_json::to_value(entity)?;
        if let Some(map) = view.as_object_mut() {
            map.insert("id".to_string(), serde_json::to_value(existing.id)?);
        }
        self.run(existing.id, UpdateOperation::Put(serde_json::from_value(view)?), None)
    }

    fn run(
        &self,
        id: EntityId,
        operation: UpdateOperation<E>,
        expected_version: Option<f64>,
    ) -> RepoResult<UpdateOutcome<E>> {
        let started_at = Instant::now();
        let result = self.apply(id, operation, expected_version);
        log_write("entity_update", E::KIND, id, started_at, &result);
        result
    }

    fn apply(
        &self,
        id: EntityId,
        operation: UpdateOperation<E>,
        expected_version: Option<f64>,
    ) -> RepoResult<UpdateOutcome<E>> {
        let fields = self.repo.update_fields();
        let original_record = self.repo.load_record(id, false)?;
        if let Some(expected) = expected_version {
            if !same_version(expected, original_record.version) {
                return Err(RepoError::ConcurrentModification {
                    kind: E::KIND,
                    id: id.to_string(),
                    expected,
                    actual: original_record.version,
                });
            }
        }

        let original: E = self
            .repo
            .set_fields(serde_json::from_str(&original_record.json)?, &fields)?;
        let mut updated = match operation {
            UpdateOperation::Put(entity) => inherit_unrequested(&original, &entity)?,
            UpdateOperation::Patch(patch) => apply_patch(&original, &patch)?,
        };
        guard_immutable(&original, &mut updated)?;

        let mut recorder = ChangeRecorder::new(original.version());
        record_common_fields(&original, &updated, &mut recorder)?;
        self.repo
            .tracked()
            .entity_specific_update(&original, &updated, &mut recorder)?;
        if recorder.is_empty() {
            return Ok(UpdateOutcome {
                entity: original,
                status: UpdateStatus::Unchanged,
                changes: None,
            });
        }

        let changes = recorder.finish();
        updated.set_deleted(original.is_deleted());
        updated.apply_stamp(ChangeStamp {
            version: next_version(original.version()),
            updated_at: now_epoch_ms(),
            updated_by: self.actor.clone(),
            change_description: Some(changes.clone()),
        });
        self.repo.persist_revision(
            &original_record,
            &updated,
            ChangeEventType::EntityUpdated,
            Some(changes.clone()),
            &self.actor,
        )?;

        Ok(UpdateOutcome {
            entity: self.repo.get(id, &fields, false)?,
            status: UpdateStatus::Updated,
            changes: Some(changes),
        })
    }
}

impl<'s, E: CatalogEntity, S: CatalogStore> EntityRepository<'s, E, S> {
    /// Shorthand for `EntityUpdater::new(self, actor).update(id, operation)`.
    pub fn update(
        &self,
        id: EntityId,
        operation: UpdateOperation<E>,
        actor: &str,
    ) -> RepoResult<UpdateOutcome<E>> {
        EntityUpdater::new(self, actor).update(id, operation)
    }

    /// Shorthand for `EntityUpdater::new(self, actor).create_or_update(entity)`.
    pub fn create_or_update(&self, entity: &E, actor: &str) -> RepoResult<UpdateOutcome<E>> {
        EntityUpdater::new(self, actor).create_or_update(entity)
    }
}

/// Applies an RFC 7386 JSON merge patch to `target`.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn inherit_unrequested<E: CatalogEntity>(original: &E, put: &E) -> RepoResult<E> {
    let original_view = serde_json::to_value(original)?;
    let mut view = serde_json::to_value(put)?;
    if let Some(map) = view.as_object_mut() {
        for field in E::relational_fields() {
            if map.contains_key(field.json_key) {
                continue;
            }
            if let Some(value) = original_view.get(field.json_key) {
                map.insert(field.json_key.to_string(), value.clone());
            }
        }
    }
    Ok(serde_json::from_value(view)?)
}

fn apply_patch<E: CatalogEntity>(original: &E, patch: &Value) -> RepoResult<E> {
    let mut view = serde_json::to_value(original)?;
    merge_patch(&mut view, patch);
    if let (Some(map), Some(patch_map)) = (view.as_object_mut(), patch.as_object()) {
        for field in E::relational_fields() {
            if matches!(patch_map.get(field.json_key), Some(Value::Null)) {
                map.insert(field.json_key.to_string(), cleared_value(field));
            }
        }
    }
    Ok(serde_json::from_value(view)?)
}

fn cleared_value(field: &RelationalField) -> Value {
    match field.cardinality {
        Cardinality::One => Value::Null,
        Cardinality::Many => Value::Array(Vec::new()),
    }
}

fn guard_immutable<E: CatalogEntity>(original: &E, updated: &mut E) -> RepoResult<()> {
    let immutable = |field: &'static str| RepoError::ImmutableField {
        kind: E::KIND,
        id: original.id().to_string(),
        field,
    };
    if updated.id() != original.id() {
        return Err(immutable("id"));
    }
    if updated.name() != original.name() {
        return Err(immutable("name"));
    }
    let original_fqn = original.fully_qualified_name();
    match updated.fully_qualified_name().map(str::to_string) {
        Some(fqn) if Some(fqn.as_str()) != original_fqn => {
            return Err(immutable("fullyQualifiedName"));
        }
        Some(_) => {}
        None => {
            if let Some(fqn) = original_fqn {
                updated.set_fully_qualified_name(fqn.to_string());
            }
        }
    }

    let original_view = serde_json::to_value(original)?;
    let updated_view = serde_json::to_value(&*updated)?;
    let identities = |refs: Vec<EntityReference>| -> Vec<(EntityId, EntityKind)> {
        refs.into_iter()
            .map(|reference| (reference.id, reference.kind))
            .collect()
    };
    for field in E::relational_fields() {
        if field.write != EdgeWrite::Fixed {
            continue;
        }
        let Some(requested) = loaded_refs(&updated_view, field)? else {
            continue;
        };
        let stored = loaded_refs(&original_view, field)?.unwrap_or_default();
        if identities(requested) != identities(stored) {
            return Err(immutable(field.selector));
        }
    }
    Ok(())
}

fn record_common_fields<E: CatalogEntity>(
    original: &E,
    updated: &E,
    recorder: &mut ChangeRecorder,
) -> RepoResult<()> {
    let original_view = serde_json::to_value(original)?;
    let updated_view = serde_json::to_value(updated)?;

    for key in COMMON_TRACKED_KEYS {
        recorder.record_value(
            key,
            original_view.get(*key).cloned().unwrap_or(Value::Null),
            updated_view.get(*key).cloned().unwrap_or(Value::Null),
        );
    }

    if E::relational_fields().contains(&OWNER_FIELD) {
        let original_owner = loaded_refs(&original_view, &OWNER_FIELD)?.unwrap_or_default();
        let updated_owner = loaded_refs(&updated_view, &OWNER_FIELD)?.unwrap_or_default();
        recorder.record_refs(
            OWNER_FIELD.json_key,
            &original_owner,
            &updated_owner,
            Cardinality::One,
        )?;
    }
    Ok(())
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
