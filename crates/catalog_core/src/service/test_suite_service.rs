//! Test suite use-case service.
//!
//! # Responsibility
//! - Provide stable entry points for test suite callers.
//! - Accept field selections as comma separated strings.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or persistence.

use crate::model::reference::{EntityId, EntityReference};
use crate::model::test_suite::TestSuite;
use crate::repo::entity_repo::ListParams;
use crate::repo::error::RepoResult;
use crate::repo::sqlite_store::CatalogStore;
use crate::repo::test_suite_repo::{test_suite_repository, TestSuiteRepository};
use crate::repo::updater::{UpdateOperation, UpdateOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for creating or replacing a test suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestSuite {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `None` leaves the owner untouched on replace.
    #[serde(default)]
    pub owner: Option<EntityReference>,
    /// `None` leaves the test list untouched on replace.
    #[serde(default)]
    pub tests: Option<Vec<EntityReference>>,
}

impl CreateTestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn into_entity(self) -> TestSuite {
        let mut suite = TestSuite::new(self.name);
        suite.display_name = self.display_name;
        suite.description = self.description;
        if let Some(owner) = self.owner {
            suite = suite.with_owner(Some(owner));
        }
        if let Some(tests) = self.tests {
            suite = suite.with_tests(tests);
        }
        suite
    }
}

/// Test suite use-case service.
pub struct TestSuiteService<'s, S: CatalogStore> {
    repo: TestSuiteRepository<'s, S>,
}

impl<'s, S: CatalogStore> TestSuiteService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            repo: test_suite_repository(store),
        }
    }

    pub fn repository(&self) -> &TestSuiteRepository<'s, S> {
        &self.repo
    }

    /// Creates a suite and returns it with the relations it was given.
    pub fn create(&self, request: CreateTestSuite, actor: &str) -> RepoResult<TestSuite> {
        self.repo.create(&request.into_entity(), actor)
    }

    /// Loads a live suite; `fields` is e.g. `"owner,tests"` or `"*"`.
    pub fn get(&self, id: EntityId, fields: &str) -> RepoResult<TestSuite> {
        let selection = self.repo.parse_fields(fields)?;
        self.repo.get(id, &selection, false)
    }

    pub fn get_by_name(&self, fqn: &str, fields: &str) -> RepoResult<TestSuite> {
        let selection = self.repo.parse_fields(fields)?;
        self.repo.get_by_name(fqn, &selection, false)
    }

    pub fn list(&self, fields: &str, params: &ListParams) -> RepoResult<Vec<TestSuite>> {
        let selection = self.repo.parse_fields(fields)?;
        self.repo.list(&selection, params)
    }

    /// Creates the suite, or replaces the one with the same name.
    pub fn create_or_update(
        &self,
        request: CreateTestSuite,
        actor: &str,
    ) -> RepoResult<UpdateOutcome<TestSuite>> {
        self.repo.create_or_update(&request.into_entity(), actor)
    }

    /// Applies a JSON merge patch.
    pub fn patch(
        &self,
        id: EntityId,
        patch: Value,
        actor: &str,
    ) -> RepoResult<UpdateOutcome<TestSuite>> {
        self.repo.update(id, UpdateOperation::Patch(patch), actor)
    }

    pub fn delete(&self, id: EntityId, hard: bool, actor: &str) -> RepoResult<()> {
        self.repo.delete(id, hard, actor)
    }

    pub fn restore(&self, id: EntityId, actor: &str) -> RepoResult<TestSuite> {
        self.repo.restore(id, actor)
    }
}

#[cfg(test)]
mod tests {
    use super::CreateTestSuite;
    use crate::model::reference::{EntityKind, EntityReference};
    use uuid::Uuid;

    #[test]
    fn omitted_relations_stay_unrequested() {
        let suite = CreateTestSuite::new("nightly").into_entity();
        assert!(suite.owner.is_not_requested());
        assert!(suite.tests.is_not_requested());
    }

    #[test]
    fn request_deserializes_from_camel_case() {
        let owner = Uuid::new_v4();
        let request: CreateTestSuite = serde_json::from_value(serde_json::json!({
            "name": "nightly",
            "displayName": "Nightly",
            "owner": {"id": owner, "type": "team"}
        }))
        .unwrap();

        assert_eq!(request.display_name.as_deref(), Some("Nightly"));
        assert_eq!(
            request.owner,
            Some(EntityReference::new(owner, EntityKind::Team))
        );
        let suite = request.into_entity();
        assert!(suite.owner.is_loaded());
    }
}
