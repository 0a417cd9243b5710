//! Test case entity.
//!
//! A test case belongs to exactly one test suite. The suite link is written
//! by the test case when it is created and names the namespace of its FQN.

use crate::model::change::{ChangeDescription, INITIAL_VERSION};
use crate::model::entity::{CatalogEntity, ChangeStamp, OWNER_FIELD};
use crate::model::fields::{Cardinality, EdgeWrite, RelationalField};
use crate::model::projected::Projected;
use crate::model::reference::{EntityId, EntityKind, EntityReference};
use crate::model::relationship::{Direction, Relationship};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TEST_SUITE_FIELD: RelationalField = RelationalField {
    selector: "testSuite",
    json_key: "testSuite",
    relationship: Relationship::Contains,
    direction: Direction::Incoming,
    related_kinds: &[EntityKind::TestSuite],
    cardinality: Cardinality::One,
    write: EdgeWrite::Fixed,
};

const TEST_CASE_FIELDS: &[RelationalField] = &[OWNER_FIELD, TEST_SUITE_FIELD];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the test definition this case instantiates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_definition: Option<String>,
    #[serde(default = "initial_version")]
    pub version: f64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<ChangeDescription>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Projected::is_not_requested")]
    pub owner: Projected<Option<EntityReference>>,
    #[serde(default, skip_serializing_if = "Projected::is_not_requested")]
    pub test_suite: Projected<Option<EntityReference>>,
}

impl TestCase {
    /// Creates an unprepared case inside `suite`.
    pub fn new(name: impl Into<String>, suite: EntityReference) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            fully_qualified_name: None,
            display_name: None,
            description: None,
            test_definition: None,
            version: INITIAL_VERSION,
            updated_at: 0,
            updated_by: None,
            change_description: None,
            deleted: false,
            owner: Projected::NotRequested,
            test_suite: Projected::Loaded(Some(suite)),
        }
    }

    pub fn with_test_definition(mut self, definition: impl Into<String>) -> Self {
        self.test_definition = Some(definition.into());
        self
    }
}

fn initial_version() -> f64 {
    INITIAL_VERSION
}

impl CatalogEntity for TestCase {
    const KIND: EntityKind = EntityKind::TestCase;

    fn relational_fields() -> &'static [RelationalField] {
        TEST_CASE_FIELDS
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn fully_qualified_name(&self) -> Option<&str> {
        self.fully_qualified_name.as_deref()
    }

    fn set_fully_qualified_name(&mut self, fqn: String) {
        self.fully_qualified_name = Some(fqn);
    }

    fn namespace_parent(&self) -> Option<&EntityReference> {
        self.test_suite.loaded().and_then(Option::as_ref)
    }

    fn version(&self) -> f64 {
        self.version
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    fn apply_stamp(&mut self, stamp: ChangeStamp) {
        self.version = stamp.version;
        self.updated_at = stamp.updated_at;
        self.updated_by = Some(stamp.updated_by);
        self.change_description = stamp.change_description;
    }
}
