//! Entity identity and lightweight references.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one catalog entity.
pub type EntityId = Uuid;

/// Entity kinds known to the catalog.
///
/// `IngestionPipeline`, `User` and `Team` records are written by other
/// repositories; this crate only links to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    TestSuite,
    TestCase,
    IngestionPipeline,
    User,
    Team,
}

impl EntityKind {
    /// Stable string id used in storage columns.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestSuite => "testSuite",
            Self::TestCase => "testCase",
            Self::IngestionPipeline => "ingestionPipeline",
            Self::User => "user",
            Self::Team => "team",
        }
    }

    /// Parses a storage column value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "testSuite" => Some(Self::TestSuite),
            "testCase" => Some(Self::TestCase),
            "ingestionPipeline" => Some(Self::IngestionPipeline),
            "user" => Some(Self::User),
            "team" => Some(Self::Team),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer to another entity as attached to relational fields.
///
/// Only `id` and `kind` are authoritative; the remaining attributes are
/// resolved from the record store on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

impl EntityReference {
    /// Reference carrying only identity, as supplied by callers.
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            fully_qualified_name: None,
            deleted: false,
        }
    }

    /// Identity-only equality; resolved attributes are ignored.
    pub fn same_target(&self, other: &EntityReference) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, EntityReference};
    use uuid::Uuid;

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            EntityKind::TestSuite,
            EntityKind::TestCase,
            EntityKind::IngestionPipeline,
            EntityKind::User,
            EntityKind::Team,
        ] {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::json!(kind.as_str()));
        }
        assert_eq!(EntityKind::parse("table"), None);
    }

    #[test]
    fn reference_serializes_kind_as_type() {
        let id = Uuid::new_v4();
        let reference = EntityReference::new(id, EntityKind::User);
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json["type"], "user");
        assert!(json.get("name").is_none());
        assert!(json.get("deleted").is_none());
    }
}
