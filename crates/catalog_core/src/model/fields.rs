//! Relational field declarations and caller field selections.
//!
//! # Responsibility
//! - Describe every relational field of an entity kind as a table row.
//! - Parse and validate caller-requested field sets.
//!
//! # Invariants
//! - A selection only ever names fields declared by the entity kind.
//! - Selection order is irrelevant; resolution follows declaration order.

use crate::model::reference::EntityKind;
use crate::model::relationship::{Direction, Relationship};
use std::collections::BTreeSet;
use thiserror::Error;

/// How many related entities a field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Which repository path writes the edges behind a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWrite {
    /// At most one edge may exist; replaced as a unit on create and update.
    Exclusive,
    /// Written once when the entity is created; never changed afterwards.
    Fixed,
    /// Edge set mirrors the field value on create and update.
    Synced,
    /// Maintained by another entity's repository; read-only here.
    ReadOnly,
}

/// One row of an entity kind's relational field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationalField {
    /// Name used in field selections.
    pub selector: &'static str,
    /// Key in the serialized entity.
    pub json_key: &'static str,
    pub relationship: Relationship,
    pub direction: Direction,
    pub related_kinds: &'static [EntityKind],
    pub cardinality: Cardinality,
    pub write: EdgeWrite,
}

impl RelationalField {
    /// Kind filter for edge lookups; `None` when several kinds are allowed.
    pub fn related_kind_filter(&self) -> Option<EntityKind> {
        match self.related_kinds {
            [single] => Some(*single),
            _ => None,
        }
    }

    pub fn allows_kind(&self, kind: EntityKind) -> bool {
        self.related_kinds.contains(&kind)
    }
}

/// Looks up a field by selector.
pub fn find_field<'a>(
    table: &'a [RelationalField],
    selector: &str,
) -> Option<&'a RelationalField> {
    table.iter().find(|field| field.selector == selector)
}

/// Raised when a selection names an undeclared field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field `{field}`; allowed fields: {allowed}")]
pub struct InvalidFieldError {
    pub field: String,
    pub allowed: String,
}

/// Set of relational fields a caller asked to have resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    selectors: BTreeSet<&'static str>,
}

impl FieldSelection {
    /// Selects nothing; every relational field stays absent.
    pub fn none() -> Self {
        Self::default()
    }

    /// Selects every declared field.
    pub fn all(table: &[RelationalField]) -> Self {
        Self {
            selectors: table.iter().map(|field| field.selector).collect(),
        }
    }

    /// Parses `"owner, tests"` style input; `*` selects every field.
    pub fn parse(input: &str, table: &[RelationalField]) -> Result<Self, InvalidFieldError> {
        let mut selectors = BTreeSet::new();
        for raw in input.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            if name == "*" {
                return Ok(Self::all(table));
            }
            match find_field(table, name) {
                Some(field) => {
                    selectors.insert(field.selector);
                }
                None => {
                    return Err(InvalidFieldError {
                        field: name.to_string(),
                        allowed: table
                            .iter()
                            .map(|field| field.selector)
                            .collect::<Vec<_>>()
                            .join(","),
                    })
                }
            }
        }
        Ok(Self { selectors })
    }

    /// Builds a selection from selector names, validating each one.
    pub fn of(names: &[&str], table: &[RelationalField]) -> Result<Self, InvalidFieldError> {
        Self::parse(&names.join(","), table)
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.selectors.contains(selector)
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.selectors.iter().copied()
    }
}
