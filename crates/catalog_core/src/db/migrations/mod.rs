//! Catalog schema history.
//!
//! # Responsibility
//! - List the catalog schema steps: entity records (1), relationship
//!   edges with the single-owner index (2), version snapshots and the change
//!   event log (3).
//! - Bring a connection up to the newest step inside one transaction.
//!
//! # Invariants
//! - Step versions strictly increase; the newest one is mirrored to
//!   `PRAGMA user_version`.
//! - A database stamped newer than this binary is never touched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "entity_records",
        sql: include_str!("0001_entity_records.sql"),
    },
    SchemaStep {
        version: 2,
        name: "entity_relationships",
        sql: include_str!("0002_entity_relationships.sql"),
    },
    SchemaStep {
        version: 3,
        name: "entity_history",
        sql: include_str!("0003_entity_history.sql"),
    },
];

/// Newest schema version this binary can write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every step newer than the connection's `user_version`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > current_version)
    {
        tx.execute_batch(step.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", step.version))?;
        info!(
            "event=db_schema_step module=db status=applied version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        current_version, latest
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
