mod common;

use catalog_core::db::open_db_in_memory;
use catalog_core::{
    test_case_repository, test_suite_repository, EntityKind, EntityReference, FieldSelection,
    RepoError, SqliteCatalogStore, TestCase, TestSuite, UpdateOperation, UpdateStatus,
};
use common::{count_edges, ids};
use serde_json::json;
use uuid::Uuid;

#[test]
fn test_case_joins_its_suite_namespace_and_edge_set() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let suite = suites.create(&TestSuite::new("sales_checks"), "admin").unwrap();

    let case = cases
        .create(
            &TestCase::new("row_count.v2", EntityReference::new(suite.id, EntityKind::TestSuite))
                .with_test_definition("tableRowCountToBeBetween"),
            "admin",
        )
        .unwrap();

    assert_eq!(
        case.fully_qualified_name.as_deref(),
        Some("sales_checks.\"row_count.v2\"")
    );
    let parent = case.test_suite.loaded().unwrap().as_ref().unwrap();
    assert_eq!(parent.id, suite.id);
    assert_eq!(parent.name.as_deref(), Some("sales_checks"));
    assert_eq!(count_edges(&conn, "contains", case.id), 1);

    let with_tests = suites
        .get(suite.id, &suites.parse_fields("tests").unwrap(), false)
        .unwrap();
    assert_eq!(ids(with_tests.tests.loaded().unwrap()), vec![case.id]);
    assert_eq!(
        with_tests.tests.loaded().unwrap()[0].fully_qualified_name,
        case.fully_qualified_name
    );
}

#[test]
fn test_case_requires_an_existing_suite() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let cases = test_case_repository(&store);

    let orphan = TestCase::new(
        "row_count",
        EntityReference::new(Uuid::new_v4(), EntityKind::TestSuite),
    );
    let err = cases.create(&orphan, "admin").unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::TestSuite,
            ..
        }
    ));
}

#[test]
fn test_definition_changes_are_tracked() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let suite = suites.create(&TestSuite::new("sales_checks"), "admin").unwrap();
    let case = cases
        .create(
            &TestCase::new("row_count", EntityReference::new(suite.id, EntityKind::TestSuite))
                .with_test_definition("tableRowCountToBeBetween"),
            "admin",
        )
        .unwrap();

    let outcome = cases
        .update(
            case.id,
            UpdateOperation::Patch(json!({ "testDefinition": "tableRowCountToEqual" })),
            "bob",
        )
        .unwrap();

    assert_eq!(outcome.status, UpdateStatus::Updated);
    let change = outcome.changes.unwrap();
    let definition = change.change_for("testDefinition").unwrap();
    assert_eq!(definition.old_value, json!("tableRowCountToBeBetween"));
    assert_eq!(definition.new_value, json!("tableRowCountToEqual"));
    assert_eq!(
        outcome.entity.test_suite.loaded().unwrap().as_ref().map(|suite| suite.id),
        Some(suite.id)
    );
}

#[test]
fn soft_deleted_suite_shows_as_deleted_reference() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let suite = suites.create(&TestSuite::new("sales_checks"), "admin").unwrap();
    let case = cases
        .create(
            &TestCase::new("row_count", EntityReference::new(suite.id, EntityKind::TestSuite)),
            "admin",
        )
        .unwrap();

    suites.delete(suite.id, false, "admin").unwrap();

    let loaded = cases
        .get(case.id, &cases.parse_fields("testSuite").unwrap(), false)
        .unwrap();
    assert!(loaded.test_suite.loaded().unwrap().as_ref().unwrap().deleted);
    assert!(cases
        .get(case.id, &FieldSelection::none(), false)
        .unwrap()
        .test_suite
        .is_not_requested());
}

#[test]
fn suite_cannot_take_a_case_held_by_another_suite() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let first = suites.create(&TestSuite::new("s1"), "admin").unwrap();
    let case = cases
        .create(
            &TestCase::new("c", EntityReference::new(first.id, EntityKind::TestSuite)),
            "admin",
        )
        .unwrap();
    let case_ref = EntityReference::new(case.id, EntityKind::TestCase);

    let err = suites
        .create(&TestSuite::new("s2").with_tests(vec![case_ref.clone()]), "admin")
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidReference {
            kind: EntityKind::TestSuite,
            field: "tests",
            target_kind: EntityKind::TestCase,
            ..
        }
    ));
    assert!(suites
        .get_by_name("s2", &FieldSelection::none(), true)
        .unwrap_err()
        .is_not_found());

    let third = suites.create(&TestSuite::new("s3"), "admin").unwrap();
    let err = suites
        .update(
            third.id,
            UpdateOperation::Patch(json!({ "tests": [{ "id": case.id, "type": "testCase" }] })),
            "bob",
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidReference { field: "tests", .. }));

    assert_eq!(count_edges(&conn, "contains", case.id), 1);
    let loaded = cases
        .get(case.id, &cases.parse_fields("testSuite").unwrap(), false)
        .unwrap();
    assert_eq!(
        loaded.test_suite.loaded().unwrap().as_ref().map(|suite| suite.id),
        Some(first.id)
    );
}

#[test]
fn suite_cannot_drop_a_case_named_under_it() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let suite = suites.create(&TestSuite::new("s1"), "admin").unwrap();
    let case = cases
        .create(
            &TestCase::new("c", EntityReference::new(suite.id, EntityKind::TestSuite)),
            "admin",
        )
        .unwrap();

    let err = suites
        .update(suite.id, UpdateOperation::Patch(json!({ "tests": [] })), "bob")
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidReference {
            field: "tests",
            target_kind: EntityKind::TestCase,
            ..
        }
    ));

    let err = suites
        .update(suite.id, UpdateOperation::Patch(json!({ "tests": null })), "bob")
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidReference { .. }));

    let reloaded = suites
        .get(suite.id, &suites.parse_fields("tests").unwrap(), false)
        .unwrap();
    assert_eq!(reloaded.version, 0.1);
    assert_eq!(ids(reloaded.tests.loaded().unwrap()), vec![case.id]);
    let loaded = cases
        .get(case.id, &cases.parse_fields("testSuite").unwrap(), false)
        .unwrap();
    assert_eq!(loaded.fully_qualified_name.as_deref(), Some("s1.c"));
    assert_eq!(
        loaded.test_suite.loaded().unwrap().as_ref().map(|parent| parent.id),
        Some(suite.id)
    );
}

#[test]
fn moving_a_case_to_another_suite_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);
    let first = suites.create(&TestSuite::new("s1"), "admin").unwrap();
    let second = suites.create(&TestSuite::new("s2"), "admin").unwrap();
    let case = cases
        .create(
            &TestCase::new("c", EntityReference::new(first.id, EntityKind::TestSuite)),
            "admin",
        )
        .unwrap();

    let err = cases
        .update(
            case.id,
            UpdateOperation::Patch(json!({ "testSuite": { "id": second.id, "type": "testSuite" } })),
            "bob",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ImmutableField {
            kind: EntityKind::TestCase,
            field: "testSuite",
            ..
        }
    ));

    let err = cases
        .update(case.id, UpdateOperation::Patch(json!({ "testSuite": null })), "bob")
        .unwrap_err();
    assert!(matches!(err, RepoError::ImmutableField { field: "testSuite", .. }));

    let loaded = cases
        .get(case.id, &cases.parse_fields("testSuite").unwrap(), false)
        .unwrap();
    assert_eq!(loaded.version, 0.1);
    assert_eq!(
        loaded.test_suite.loaded().unwrap().as_ref().map(|parent| parent.id),
        Some(first.id)
    );
}

#[test]
fn prepare_twice_yields_the_same_names() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let suites = test_suite_repository(&store);
    let cases = test_case_repository(&store);

    let mut suite = TestSuite::new("sales.checks");
    suites.prepare(&mut suite).unwrap();
    let first = suite.fully_qualified_name.clone();
    suites.prepare(&mut suite).unwrap();
    assert_eq!(first.as_deref(), Some("\"sales.checks\""));
    assert_eq!(suite.fully_qualified_name, first);

    let created = suites.create(&suite, "admin").unwrap();
    let mut case = TestCase::new(
        "row_count",
        EntityReference::new(created.id, EntityKind::TestSuite),
    );
    cases.prepare(&mut case).unwrap();
    let first = case.fully_qualified_name.clone();
    cases.prepare(&mut case).unwrap();
    assert_eq!(first.as_deref(), Some("\"sales.checks\".row_count"));
    assert_eq!(case.fully_qualified_name, first);
}
