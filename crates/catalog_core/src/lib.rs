//! Catalog persistence core.
//! Stores typed entities as JSON payloads and their relations as typed edges.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod naming;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::change::{ChangeDescription, ChangeEvent, ChangeEventType, FieldChange};
pub use model::entity::CatalogEntity;
pub use model::fields::FieldSelection;
pub use model::projected::Projected;
pub use model::reference::{EntityId, EntityKind, EntityReference};
pub use model::relationship::{Direction, EdgeQuery, EdgeRecord, Relationship};
pub use model::test_case::TestCase;
pub use model::test_suite::TestSuite;
pub use naming::{DefaultNamingService, InvalidNameError, NamingService};
pub use repo::entity_repo::{EntityRepository, ListParams};
pub use repo::error::{RepoError, RepoResult};
pub use repo::record_store::{RecordStore, StoredRecord};
pub use repo::relationship_store::RelationshipStore;
pub use repo::sqlite_store::{CatalogStore, SqliteCatalogStore};
pub use repo::test_case_repo::{test_case_repository, TestCaseRepository};
pub use repo::test_suite_repo::{test_suite_repository, TestSuiteRepository};
pub use repo::updater::{EntityUpdater, UpdateOperation, UpdateOutcome, UpdateStatus};
pub use service::test_suite_service::{CreateTestSuite, TestSuiteService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
