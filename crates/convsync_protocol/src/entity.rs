//! Entity identity, revision markers and property deltas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Property mapping produced for an entity and shipped to the client.
pub type PropertyMap = serde_json::Map<String, serde_json::Value>;

/// Identity of an entity as seen by a conversation.
///
/// The `kind` is the exact type name of the entity. Two keys with the same
/// `id` but different kinds are different entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    kind: String,
    id: String,
}

impl EntityKey {
    /// Creates a new entity key.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Returns the exact type name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the identity within the type.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true if this key is of exactly the given kind.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Opaque "last modified" marker of an entity.
///
/// Only equality is meaningful: equal revisions mean the entity did not
/// change since the revision was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(u64);

impl Revision {
    /// Creates a revision from a raw marker value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw marker value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// The filtered state of one entity, queued for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    /// Entity identity.
    pub key: EntityKey,
    /// Filtered property mapping.
    pub properties: PropertyMap,
}

impl EntityDelta {
    /// Creates a new delta.
    pub fn new(key: EntityKey, properties: PropertyMap) -> Self {
        Self { key, properties }
    }

    /// Returns a property value, if present.
    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties.get(name)
    }
}
