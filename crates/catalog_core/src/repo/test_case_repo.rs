//! Test case repository wiring.

use crate::model::test_case::TestCase;
use crate::repo::entity_repo::EntityRepository;
use crate::repo::error::RepoResult;
use crate::repo::sqlite_store::CatalogStore;
use crate::repo::updater::{ChangeRecorder, TrackedFieldsProvider};

pub type TestCaseRepository<'s, S> = EntityRepository<'s, TestCase, S>;

/// Tracks which test definition a case instantiates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestCaseTrackedFields;

impl TrackedFieldsProvider<TestCase> for TestCaseTrackedFields {
    fn entity_specific_update(
        &self,
        original: &TestCase,
        updated: &TestCase,
        recorder: &mut ChangeRecorder,
    ) -> RepoResult<()> {
        recorder.record_change(
            "testDefinition",
            &original.test_definition,
            &updated.test_definition,
        )?;
        Ok(())
    }
}

pub fn test_case_repository<S: CatalogStore>(store: &S) -> TestCaseRepository<'_, S> {
    EntityRepository::new(store, TestCaseTrackedFields)
}
