//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::fields::InvalidFieldError;
use crate::model::reference::EntityKind;
use crate::model::relationship::Relationship;
use crate::naming::InvalidNameError;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure surfaced by stores and repositories.
///
/// Every variant carries enough context (kind, id or name, field,
/// relationship) to diagnose without re-running the operation.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Name is empty or violates the namespace grammar.
    #[error("invalid name for {kind}: {source}")]
    InvalidName {
        kind: EntityKind,
        #[source]
        source: InvalidNameError,
    },
    /// Field selection names an undeclared field.
    #[error("{kind}: {source}")]
    InvalidField {
        kind: EntityKind,
        #[source]
        source: InvalidFieldError,
    },
    /// Record with the same id or fully qualified name already exists.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: EntityKind, key: String },
    /// Entity (or an edge target) does not exist.
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: String },
    /// More than one edge where the field allows exactly one.
    #[error(
        "{kind} {id}: field `{field}` expects one `{relationship}` edge but found {found}"
    )]
    AmbiguousRelationship {
        kind: EntityKind,
        id: String,
        field: &'static str,
        relationship: Relationship,
        found: usize,
    },
    /// Reference points at a kind the field does not accept.
    #[error("{kind}: field `{field}` cannot reference {target_kind} {target_id}")]
    InvalidReference {
        kind: EntityKind,
        field: &'static str,
        target_kind: EntityKind,
        target_id: String,
    },
    /// Update tried to change an immutable attribute.
    #[error("{kind} {id}: field `{field}` is immutable")]
    ImmutableField {
        kind: EntityKind,
        id: String,
        field: &'static str,
    },
    /// Stored version moved on since the update was computed.
    #[error("{kind} {id} was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification {
        kind: EntityKind,
        id: String,
        expected: f64,
        actual: f64,
    },
    /// Underlying store failed; never retried here.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),
    /// Persisted row cannot be decoded.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Connection schema is not at the expected migrated version.
    #[error("catalog store requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("catalog store requires table `{0}`")]
    MissingRequiredTable(&'static str),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StoreUnavailable(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Stable code used in `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::InvalidField { .. } => "invalid_field",
            Self::AlreadyExists { .. } => "already_exists",
            Self::NotFound { .. } => "not_found",
            Self::AmbiguousRelationship { .. } => "ambiguous_relationship",
            Self::InvalidReference { .. } => "invalid_reference",
            Self::ImmutableField { .. } => "immutable_field",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InvalidData(_) => "invalid_data",
            Self::Serialization(_) => "serialization",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_required_table",
        }
    }
}
