//! Repository layer: storage contracts, SQLite implementations and the
//! generic entity lifecycle.
//!
//! # Responsibility
//! - Define record, relationship and change-log store contracts.
//! - Keep SQL inside `SqliteCatalogStore`.
//! - Drive create/read/update/delete for any `CatalogEntity` kind.
//!
//! # Invariants
//! - Only `EntityRepository` writes records and edges for its kind.
//! - Multi-statement writes run inside one store transaction.

pub mod change_log;
pub mod entity_repo;
pub mod error;
pub mod record_store;
pub mod relationship_store;
pub mod sqlite_store;
pub mod test_case_repo;
pub mod test_suite_repo;
pub mod updater;
