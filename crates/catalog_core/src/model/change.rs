//! Change records produced by entity updates.
//!
//! # Invariants
//! - A `FieldChange` is only produced when old and new values differ.
//! - Versions advance by `0.1` per committed change set.

use crate::model::reference::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version assigned to newly created entities.
pub const INITIAL_VERSION: f64 = 0.1;

/// Returns the version following `current`.
pub fn next_version(current: f64) -> f64 {
    (version_tenths(current) + 1) as f64 / 10.0
}

/// Compares versions without floating point drift.
pub fn same_version(left: f64, right: f64) -> bool {
    version_tenths(left) == version_tenths(right)
}

fn version_tenths(version: f64) -> i64 {
    (version * 10.0).round() as i64
}

/// One tracked field whose value changed during an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub name: String,
    #[serde(default)]
    pub old_value: Value,
    #[serde(default)]
    pub new_value: Value,
}

/// Change set of one committed update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDescription {
    pub fields_added: Vec<FieldChange>,
    pub fields_updated: Vec<FieldChange>,
    pub fields_deleted: Vec<FieldChange>,
    pub previous_version: f64,
}

impl ChangeDescription {
    pub fn is_empty(&self) -> bool {
        self.fields_added.is_empty()
            && self.fields_updated.is_empty()
            && self.fields_deleted.is_empty()
    }

    /// All changes in added, updated, deleted order.
    pub fn changes(&self) -> impl Iterator<Item = &FieldChange> {
        self.fields_added
            .iter()
            .chain(self.fields_updated.iter())
            .chain(self.fields_deleted.iter())
    }

    /// Finds the change recorded for `field`.
    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes().find(|change| change.name == field)
    }
}

/// Lifecycle transition captured in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeEventType {
    EntityCreated,
    EntityUpdated,
    EntitySoftDeleted,
    EntityRestored,
    EntityDeleted,
}

impl ChangeEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityCreated => "entityCreated",
            Self::EntityUpdated => "entityUpdated",
            Self::EntitySoftDeleted => "entitySoftDeleted",
            Self::EntityRestored => "entityRestored",
            Self::EntityDeleted => "entityDeleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "entityCreated" => Some(Self::EntityCreated),
            "entityUpdated" => Some(Self::EntityUpdated),
            "entitySoftDeleted" => Some(Self::EntitySoftDeleted),
            "entityRestored" => Some(Self::EntityRestored),
            "entityDeleted" => Some(Self::EntityDeleted),
            _ => None,
        }
    }
}

/// One persisted audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: ChangeEventType,
    pub entity_id: EntityId,
    pub entity_kind: EntityKind,
    pub previous_version: Option<f64>,
    pub current_version: f64,
    pub user_name: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub change_description: Option<ChangeDescription>,
}
