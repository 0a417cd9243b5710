//! Relationship vocabulary and edge records.

use crate::model::reference::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Typed meaning of a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Source groups or owns the lifecycle of the target.
    Contains,
    /// Source actor (user/team) owns the target.
    Owns,
}

impl Relationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Owns => "owns",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contains" => Some(Self::Contains),
            "owns" => Some(Self::Owns),
            _ => None,
        }
    }
}

impl Display for Relationship {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which end of an edge the anchor entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Anchor is the edge source; related entities are targets.
    Outgoing,
    /// Anchor is the edge target; related entities are sources.
    Incoming,
}

/// One stored edge `(from) -[relationship]-> (to)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    pub from_id: EntityId,
    pub from_kind: EntityKind,
    pub relationship: Relationship,
    pub to_id: EntityId,
    pub to_kind: EntityKind,
}

impl EdgeRecord {
    /// Returns the endpoint opposite to the anchor for `direction`.
    pub fn related(&self, direction: Direction) -> (EntityId, EntityKind) {
        match direction {
            Direction::Outgoing => (self.to_id, self.to_kind),
            Direction::Incoming => (self.from_id, self.from_kind),
        }
    }

    /// Builds the edge linking `anchor` and `related` in `direction`.
    pub fn between(
        anchor: (EntityId, EntityKind),
        relationship: Relationship,
        related: (EntityId, EntityKind),
        direction: Direction,
    ) -> Self {
        let (from, to) = match direction {
            Direction::Outgoing => (anchor, related),
            Direction::Incoming => (related, anchor),
        };
        Self {
            from_id: from.0,
            from_kind: from.1,
            relationship,
            to_id: to.0,
            to_kind: to.1,
        }
    }
}

/// Edge lookup anchored at one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeQuery {
    pub anchor_id: EntityId,
    pub anchor_kind: EntityKind,
    pub relationship: Relationship,
    /// Optional filter on the kind at the other end.
    pub related_kind: Option<EntityKind>,
    pub direction: Direction,
}
