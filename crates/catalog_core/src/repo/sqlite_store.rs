//! SQLite-backed catalog store.
//!
//! # Responsibility
//! - Own the connection handle shared by the record, relationship and
//!   change-log store implementations.
//! - Provide the transaction boundary used by repository writes.
//!
//! # Invariants
//! - Construction rejects connections that are not fully migrated.
//! - Nested `in_transaction` calls join the outer transaction.

use crate::db::migrations::latest_version;
use crate::model::reference::{EntityId, EntityKind};
use crate::repo::change_log::ChangeLogStore;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::record_store::RecordStore;
use crate::repo::relationship_store::RelationshipStore;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use uuid::Uuid;

const REQUIRED_TABLES: &[&str] = &[
    "entity_records",
    "entity_relationships",
    "entity_versions",
    "entity_change_events",
];

/// Everything the entity repository needs from persistence.
pub trait CatalogStore: RecordStore + RelationshipStore + ChangeLogStore {
    /// Runs `work` atomically: either every write inside it commits or none.
    fn in_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce() -> RepoResult<T>;
}

/// Catalog store over one migrated SQLite connection.
pub struct SqliteCatalogStore<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteCatalogStore<'conn> {
    /// Wraps a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl CatalogStore for SqliteCatalogStore<'_> {
    fn in_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce() -> RepoResult<T>,
    {
        if !self.conn.is_autocommit() {
            return work();
        }

        // Dropping `tx` on the error path rolls everything back.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = work()?;
        tx.commit()?;
        Ok(value)
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<EntityId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_kind(value: &str, column: &'static str) -> RepoResult<EntityKind> {
    EntityKind::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid entity kind `{value}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
