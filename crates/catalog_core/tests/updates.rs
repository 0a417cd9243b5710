mod common;

use catalog_core::db::open_db_in_memory;
use catalog_core::{
    test_suite_repository, ChangeEventType, Direction, EdgeRecord, EntityKind, EntityUpdater,
    FieldSelection, RelationshipStore, Relationship, RepoError, SqliteCatalogStore, TestSuite,
    UpdateOperation, UpdateStatus,
};
use common::{count_edges, count_rows, ids, seed};
use serde_json::json;

#[test]
fn replacing_tests_records_a_tests_change() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let a = seed(&store, EntityKind::TestCase, "A");
    let b = seed(&store, EntityKind::TestCase, "B");
    let c = seed(&store, EntityKind::TestCase, "C");
    let created = repo
        .create(
            &TestSuite::new("sales_checks").with_tests(vec![a.clone(), b.clone()]),
            "admin",
        )
        .unwrap();

    let replacement =
        TestSuite::with_id(created.id, "sales_checks").with_tests(vec![a.clone(), c.clone()]);
    let outcome = repo
        .update(created.id, UpdateOperation::Put(replacement), "bob")
        .unwrap();

    assert_eq!(outcome.status, UpdateStatus::Updated);
    let changes = outcome.changes.unwrap();
    let tests_change = changes.change_for("tests").unwrap();
    assert_eq!(
        tests_change.old_value,
        json!([{ "id": a.id, "type": "testCase" }, { "id": b.id, "type": "testCase" }])
    );
    assert_eq!(
        tests_change.new_value,
        json!([{ "id": a.id, "type": "testCase" }, { "id": c.id, "type": "testCase" }])
    );
    assert_eq!(changes.fields_updated.len(), 1);
    assert_eq!(ids(outcome.entity.tests.loaded().unwrap()), vec![a.id, c.id]);
    assert_eq!(count_edges(&conn, "contains", b.id), 0);
    assert_eq!(count_edges(&conn, "contains", c.id), 1);
}

#[test]
fn reordering_tests_rewrites_the_stored_order() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let a = seed(&store, EntityKind::TestCase, "A");
    let b = seed(&store, EntityKind::TestCase, "B");
    let c = seed(&store, EntityKind::TestCase, "C");
    let created = repo
        .create(
            &TestSuite::new("sales_checks").with_tests(vec![a.clone(), b.clone()]),
            "admin",
        )
        .unwrap();

    let outcome = repo
        .update(
            created.id,
            UpdateOperation::Patch(json!({ "tests": [
                { "id": b.id, "type": "testCase" },
                { "id": a.id, "type": "testCase" },
            ] })),
            "bob",
        )
        .unwrap();

    assert_eq!(outcome.status, UpdateStatus::Updated);
    let changes = outcome.changes.unwrap();
    let tests_change = changes.change_for("tests").unwrap();
    assert_eq!(
        tests_change.new_value,
        json!([{ "id": b.id, "type": "testCase" }, { "id": a.id, "type": "testCase" }])
    );
    assert_eq!(ids(outcome.entity.tests.loaded().unwrap()), vec![b.id, a.id]);
    assert_eq!(count_edges(&conn, "contains", a.id), 1);
    assert_eq!(count_edges(&conn, "contains", b.id), 1);

    let outcome = repo
        .update(
            created.id,
            UpdateOperation::Patch(json!({ "tests": [
                { "id": b.id, "type": "testCase" },
                { "id": c.id, "type": "testCase" },
                { "id": a.id, "type": "testCase" },
            ] })),
            "bob",
        )
        .unwrap();
    assert_eq!(ids(outcome.entity.tests.loaded().unwrap()), vec![b.id, c.id, a.id]);

    let reread = repo
        .get(created.id, &repo.parse_fields("tests").unwrap(), false)
        .unwrap();
    assert_eq!(ids(reread.tests.loaded().unwrap()), vec![b.id, c.id, a.id]);
    assert_eq!(reread.version, 0.3);
}

#[test]
fn committed_update_bumps_version_and_keeps_history() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let created = repo
        .create(&TestSuite::new("nightly").with_description("v1"), "admin")
        .unwrap();

    let outcome = repo
        .update(
            created.id,
            UpdateOperation::Patch(json!({ "description": "v2" })),
            "bob",
        )
        .unwrap();
    assert_eq!(outcome.entity.version, 0.2);
    assert_eq!(outcome.entity.updated_by.as_deref(), Some("bob"));
    assert_eq!(
        outcome.entity.change_description.as_ref().unwrap().previous_version,
        0.1
    );

    let versions = repo.list_versions(created.id).unwrap();
    let descriptions: Vec<Option<&str>> = versions
        .iter()
        .map(|suite| suite.description.as_deref())
        .collect();
    assert_eq!(descriptions, vec![Some("v1"), Some("v2")]);
    assert_eq!(
        repo.get_version(created.id, 0.1).unwrap().description.as_deref(),
        Some("v1")
    );
    assert!(repo.get_version(created.id, 0.7).unwrap_err().is_not_found());

    let events = repo.list_change_events(created.id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type, ChangeEventType::EntityUpdated);
    assert_eq!(events[1].previous_version, Some(0.1));
    assert_eq!(events[1].current_version, 0.2);
    assert_eq!(events[1].user_name, "bob");
    assert!(events[1]
        .change_description
        .as_ref()
        .unwrap()
        .change_for("description")
        .is_some());
}

#[test]
fn update_without_tracked_changes_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let owner = seed(&store, EntityKind::User, "alice");
    let created = repo
        .create(
            &TestSuite::new("nightly")
                .with_description("same")
                .with_owner(Some(owner)),
            "admin",
        )
        .unwrap();

    let replacement = TestSuite::with_id(created.id, "nightly").with_description("same");
    let outcome = repo
        .update(created.id, UpdateOperation::Put(replacement), "bob")
        .unwrap();

    assert_eq!(outcome.status, UpdateStatus::Unchanged);
    assert!(outcome.changes.is_none());
    assert_eq!(outcome.entity.version, 0.1);
    assert!(outcome.entity.owner.loaded().unwrap().is_some());
    assert_eq!(count_rows(&conn, "entity_versions"), 0);
    assert_eq!(count_rows(&conn, "entity_change_events"), 1);
}

#[test]
fn patch_null_clears_owner() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let owner = seed(&store, EntityKind::User, "alice");
    let created = repo
        .create(&TestSuite::new("nightly").with_owner(Some(owner)), "admin")
        .unwrap();

    let outcome = repo
        .update(created.id, UpdateOperation::Patch(json!({ "owner": null })), "bob")
        .unwrap();

    assert_eq!(outcome.status, UpdateStatus::Updated);
    assert_eq!(outcome.entity.owner.loaded(), Some(&None));
    let changes = outcome.changes.unwrap();
    assert_eq!(changes.fields_deleted.len(), 1);
    assert_eq!(changes.fields_deleted[0].name, "owner");
    assert_eq!(count_edges(&conn, "owns", created.id), 0);
}

#[test]
fn immutable_fields_are_guarded() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let created = repo.create(&TestSuite::new("nightly"), "admin").unwrap();

    let err = repo
        .update(created.id, UpdateOperation::Patch(json!({ "name": "daily" })), "bob")
        .unwrap_err();
    assert!(matches!(err, RepoError::ImmutableField { field: "name", .. }));

    let err = repo
        .update(
            created.id,
            UpdateOperation::Patch(json!({ "fullyQualifiedName": "other.nightly" })),
            "bob",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::ImmutableField {
            field: "fullyQualifiedName",
            ..
        }
    ));

    let err = repo
        .update(created.id, UpdateOperation::Put(TestSuite::new("nightly")), "bob")
        .unwrap_err();
    assert!(matches!(err, RepoError::ImmutableField { field: "id", .. }));
    assert_eq!(count_rows(&conn, "entity_change_events"), 1);
}

#[test]
fn stale_version_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let created = repo.create(&TestSuite::new("nightly"), "admin").unwrap();

    EntityUpdater::new(&repo, "alice")
        .update_if_version(
            created.id,
            UpdateOperation::Patch(json!({ "description": "first" })),
            0.1,
        )
        .unwrap();
    let err = EntityUpdater::new(&repo, "bob")
        .update_if_version(
            created.id,
            UpdateOperation::Patch(json!({ "description": "second" })),
            0.1,
        )
        .unwrap_err();

    match err {
        RepoError::ConcurrentModification {
            expected, actual, ..
        } => {
            assert_eq!(expected, 0.1);
            assert_eq!(actual, 0.2);
        }
        other => panic!("unexpected error: {other}"),
    }
    let current = repo.get(created.id, &FieldSelection::none(), false).unwrap();
    assert_eq!(current.description.as_deref(), Some("first"));
}

#[test]
fn updating_a_missing_entity_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let ghost = TestSuite::new("ghost");

    let err = repo
        .update(ghost.id, UpdateOperation::Put(ghost.clone()), "bob")
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn pipeline_is_read_only_and_must_be_unique() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let created = repo.create(&TestSuite::new("nightly"), "admin").unwrap();
    let first = seed(&store, EntityKind::IngestionPipeline, "ingest_orders");
    let link = |pipeline: &catalog_core::EntityReference| {
        EdgeRecord::between(
            (created.id, EntityKind::TestSuite),
            Relationship::Contains,
            (pipeline.id, pipeline.kind),
            Direction::Outgoing,
        )
    };
    store.put_edge(&link(&first)).unwrap();

    let pipelines = repo.parse_fields("pipelines").unwrap();
    let loaded = repo.get(created.id, &pipelines, false).unwrap();
    assert_eq!(
        loaded.pipeline.loaded().unwrap().as_ref().map(|pipeline| pipeline.id),
        Some(first.id)
    );

    let outcome = repo
        .update(created.id, UpdateOperation::Patch(json!({ "pipeline": null })), "bob")
        .unwrap();
    assert_eq!(outcome.status, UpdateStatus::Unchanged);
    assert_eq!(count_edges(&conn, "contains", first.id), 1);

    let second = seed(&store, EntityKind::IngestionPipeline, "ingest_refunds");
    store.put_edge(&link(&second)).unwrap();
    let err = repo.get(created.id, &pipelines, false).unwrap_err();
    match err {
        RepoError::AmbiguousRelationship {
            field,
            relationship,
            found,
            ..
        } => {
            assert_eq!(field, "pipelines");
            assert_eq!(relationship, Relationship::Contains);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(repo.get(created.id, &FieldSelection::none(), false).is_ok());
}

#[test]
fn create_or_update_creates_then_replaces_by_name() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteCatalogStore::try_new(&conn).unwrap();
    let repo = test_suite_repository(&store);
    let owner = seed(&store, EntityKind::User, "alice");

    let first = repo
        .create_or_update(
            &TestSuite::new("nightly").with_owner(Some(owner.clone())),
            "admin",
        )
        .unwrap();
    assert_eq!(first.status, UpdateStatus::Created);

    let second = repo
        .create_or_update(&TestSuite::new("nightly").with_description("now documented"), "admin")
        .unwrap();
    assert_eq!(second.status, UpdateStatus::Updated);
    assert_eq!(second.entity.id, first.entity.id);
    assert_eq!(second.entity.description.as_deref(), Some("now documented"));
    assert_eq!(
        second.entity.owner.loaded().unwrap().as_ref().map(|owner| owner.id),
        Some(owner.id)
    );
    assert!(second.changes.unwrap().change_for("owner").is_none());
}
