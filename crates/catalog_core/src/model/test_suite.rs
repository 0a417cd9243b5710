//! Test suite entity.
//!
//! A test suite groups test cases, may be owned by a user or team and may be
//! executed by one ingestion pipeline. All three links live in the
//! relationship store.

use crate::model::change::{ChangeDescription, INITIAL_VERSION};
use crate::model::entity::{CatalogEntity, ChangeStamp, OWNER_FIELD};
use crate::model::fields::{Cardinality, EdgeWrite, RelationalField};
use crate::model::projected::Projected;
use crate::model::reference::{EntityId, EntityKind, EntityReference};
use crate::model::relationship::{Direction, Relationship};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TESTS_FIELD: RelationalField = RelationalField {
    selector: "tests",
    json_key: "tests",
    relationship: Relationship::Contains,
    direction: Direction::Outgoing,
    related_kinds: &[EntityKind::TestCase],
    cardinality: Cardinality::Many,
    write: EdgeWrite::Synced,
};

pub const PIPELINES_FIELD: RelationalField = RelationalField {
    selector: "pipelines",
    json_key: "pipeline",
    relationship: Relationship::Contains,
    direction: Direction::Outgoing,
    related_kinds: &[EntityKind::IngestionPipeline],
    cardinality: Cardinality::One,
    write: EdgeWrite::ReadOnly,
};

const TEST_SUITE_FIELDS: &[RelationalField] = &[OWNER_FIELD, PIPELINES_FIELD, TESTS_FIELD];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "initial_version")]
    pub version: f64,
    /// Epoch milliseconds of the last committed change.
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
    pub pipeline: Projected<Option<EntityReference>>,
    #[serde(default, skip_serializing_if = "Projected::is_not_requested")]
    pub tests: Projected<Vec<EntityReference>>,
}

impl TestSuite {
    /// Creates an unprepared suite with a fresh id and no relations loaded.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            fully_qualified_name: None,
            display_name: None,
            description: None,
            version: INITIAL_VERSION,
            updated_at: 0,
            updated_by: None,
            change_description: None,
            deleted: false,
            owner: Projected::NotRequested,
            pipeline: Projected::NotRequested,
            tests: Projected::NotRequested,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_owner(mut self, owner: Option<EntityReference>) -> Self {
        self.owner = Projected::Loaded(owner);
        self
    }

    pub fn with_tests(mut self, tests: Vec<EntityReference>) -> Self {
        self.tests = Projected::Loaded(tests);
        self
    }
}

fn initial_version() -> f64 {
    INITIAL_VERSION
}

impl CatalogEntity for TestSuite {
    const KIND: EntityKind = EntityKind::TestSuite;

    fn relational_fields() -> &'static [RelationalField] {
        TEST_SUITE_FIELDS
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
