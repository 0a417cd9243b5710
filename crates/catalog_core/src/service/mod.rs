//! Use-case services.
//!
//! # Responsibility
//! - Turn caller requests into repository operations.
//! - Keep request shapes decoupled from persisted entity shapes.

pub mod test_suite_service;
