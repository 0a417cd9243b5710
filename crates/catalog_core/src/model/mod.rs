//! Catalog domain model.
//!
//! # Responsibility
//! - Define entity kinds, references and the relationship vocabulary.
//! - Describe relational fields as data so repositories stay kind-agnostic.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId` within its kind.
//! - Relational fields are never part of a stored payload.

pub mod change;
pub mod entity;
pub mod fields;
pub mod projected;
pub mod reference;
pub mod relationship;
pub mod test_case;
pub mod test_suite;
