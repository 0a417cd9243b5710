//! Capability contract shared by every persisted entity kind.

use crate::model::change::ChangeDescription;
use crate::model::fields::{Cardinality, EdgeWrite, RelationalField};
use crate::model::reference::{EntityId, EntityKind, EntityReference};
use crate::model::relationship::{Direction, Relationship};
use crate::model::test_case::TestCase;
use crate::model::test_suite::TestSuite;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Owner field declaration shared by all owned kinds.
pub const OWNER_FIELD: RelationalField = RelationalField {
    selector: "owner",
    json_key: "owner",
    relationship: Relationship::Owns,
    direction: Direction::Incoming,
    related_kinds: &[EntityKind::User, EntityKind::Team],
    cardinality: Cardinality::One,
    write: EdgeWrite::Exclusive,
};

/// Bookkeeping written by the repository on every committed change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeStamp {
    pub version: f64,
    pub updated_at: i64,
    pub updated_by: String,
    pub change_description: Option<ChangeDescription>,
}

/// Entity kind persisted through the generic repository.
///
/// Implementations declare their relational fields as data; the repository
/// derives stripping, projection and edge maintenance from that table and
/// from the serde representation, so no per-field code is needed here.
pub trait CatalogEntity: Serialize + DeserializeOwned + Clone + Debug + 'static {
    const KIND: EntityKind;

    /// Relational field table, in resolution order.
    fn relational_fields() -> &'static [RelationalField];

    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
    fn fully_qualified_name(&self) -> Option<&str>;
    fn set_fully_qualified_name(&mut self, fqn: String);

    /// Parent whose FQN prefixes this entity's FQN. `None` for top-level kinds.
    fn namespace_parent(&self) -> Option<&EntityReference> {
        None
    }

    fn version(&self) -> f64;
    /// Epoch milliseconds of the last committed change.
    fn updated_at(&self) -> i64;
    fn is_deleted(&self) -> bool;
    fn set_deleted(&mut self, deleted: bool);
    fn apply_stamp(&mut self, stamp: ChangeStamp);

    fn to_reference(&self) -> EntityReference {
        EntityReference {
            id: self.id(),
            kind: Self::KIND,
            name: Some(self.name().to_string()),
            fully_qualified_name: self.fully_qualified_name().map(str::to_string),
            deleted: self.is_deleted(),
        }
    }
}

/// Relational field table of `kind`; empty for kinds this crate only links to.
pub fn relational_fields_of(kind: EntityKind) -> &'static [RelationalField] {
    match kind {
        EntityKind::TestSuite => TestSuite::relational_fields(),
        EntityKind::TestCase => TestCase::relational_fields(),
        EntityKind::IngestionPipeline | EntityKind::User | EntityKind::Team => &[],
    }
}

/// Field of `related_kind` that reads the edges behind `field` from the
/// other end, if that kind declares one.
pub fn inverse_field(
    anchor_kind: EntityKind,
    field: &RelationalField,
    related_kind: EntityKind,
) -> Option<&'static RelationalField> {
    relational_fields_of(related_kind).iter().find(|candidate| {
        candidate.relationship == field.relationship
            && candidate.direction != field.direction
            && candidate.allows_kind(anchor_kind)
    })
}
