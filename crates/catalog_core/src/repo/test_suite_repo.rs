//! Test suite repository wiring.

use crate::model::fields::Cardinality;
use crate::model::test_suite::{TestSuite, TESTS_FIELD};
use crate::repo::entity_repo::EntityRepository;
use crate::repo::error::RepoResult;
use crate::repo::sqlite_store::CatalogStore;
use crate::repo::updater::{ChangeRecorder, TrackedFieldsProvider};

pub type TestSuiteRepository<'s, S> = EntityRepository<'s, TestSuite, S>;

/// Tracks the suite's test membership on top of the common fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestSuiteTrackedFields;

impl TrackedFieldsProvider<TestSuite> for TestSuiteTrackedFields {
    fn entity_specific_update(
        &self,
        original: &TestSuite,
        updated: &TestSuite,
        recorder: &mut ChangeRecorder,
    ) -> RepoResult<()> {
        let empty = Vec::new();
        recorder.record_refs(
            TESTS_FIELD.json_key,
            original.tests.loaded().unwrap_or(&empty),
            updated.tests.loaded().unwrap_or(&empty),
            Cardinality::Many,
        )?;
        Ok(())
    }
}

pub fn test_suite_repository<S: CatalogStore>(store: &S) -> TestSuiteRepository<'_, S> {
    EntityRepository::new(store, TestSuiteTrackedFields)
}
