//! On-demand relational field values.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value of a relational field that is only populated when requested.
///
/// `NotRequested` is distinct from a loaded empty value so callers can tell
/// under-fetching apart from a relation that legitimately has no targets.
/// Entity structs pair it with
/// `#[serde(default, skip_serializing_if = "Projected::is_not_requested")]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projected<T> {
    #[default]
    NotRequested,
    Loaded(T),
}

impl<T> Projected<T> {
    pub fn is_not_requested(&self) -> bool {
        matches!(self, Self::NotRequested)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Borrows the loaded value, if any.
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotRequested => None,
        }
    }

    pub fn into_loaded(self) -> Option<T> {
        match self {
            Self::Loaded(value) => Some(value),
            Self::NotRequested => None,
        }
    }
}

impl<T> From<T> for Projected<T> {
    fn from(value: T) -> Self {
        Self::Loaded(value)
    }
}

impl<T: Serialize> Serialize for Projected<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Loaded(value) => value.serialize(serializer),
            Self::NotRequested => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Projected<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Self::Loaded)
    }
}
