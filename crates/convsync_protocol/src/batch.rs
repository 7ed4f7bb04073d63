//! The batch of changes handed to the transport on every drain.

use crate::entity::{EntityDelta, EntityKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Conversation metadata stamped on every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Number of the owning conversation.
    pub conversation_number: u32,
    /// Namespace token the client uses when minting its own entity ids.
    pub entity_id_base: String,
    /// Whether the session runs in development mode.
    pub development_mode: bool,
}

impl BatchMetadata {
    /// Creates metadata with a fresh random entity id namespace.
    pub fn new(conversation_number: u32, development_mode: bool) -> Self {
        Self {
            conversation_number,
            entity_id_base: uuid::Uuid::new_v4().to_string(),
            development_mode,
        }
    }
}

/// Entity deltas and tombstones accumulated between two drains.
///
/// Deltas keep insertion order: a slave entity is always queued before the
/// entity that references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferBatch {
    /// Conversation metadata.
    pub metadata: BatchMetadata,
    /// Entity deltas in insertion order.
    pub entities: Vec<EntityDelta>,
    /// Entities deleted since the last drain.
    pub deleted_entities: BTreeSet<EntityKey>,
}

impl TransferBatch {
    /// Creates an empty batch.
    pub fn new(metadata: BatchMetadata) -> Self {
        Self {
            metadata,
            entities: Vec::new(),
            deleted_entities: BTreeSet::new(),
        }
    }

    /// Queues an entity delta.
    pub fn add_entity(&mut self, delta: EntityDelta) {
        self.entities.push(delta);
    }

    /// Queues a tombstone. Returns false if it was already queued.
    pub fn add_deleted_entity(&mut self, key: EntityKey) -> bool {
        self.deleted_entities.insert(key)
    }

    /// Returns true if neither deltas nor tombstones are queued.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.deleted_entities.is_empty()
    }

    /// Number of queued deltas plus tombstones.
    pub fn len(&self) -> usize {
        self.entities.len() + self.deleted_entities.len()
    }

    /// Position of the first delta for `key`.
    pub fn position_of(&self, key: &EntityKey) -> Option<usize> {
        self.entities.iter().position(|delta| &delta.key == key)
    }

    /// Returns true if a delta for `key` is queued.
    pub fn contains_entity(&self, key: &EntityKey) -> bool {
        self.position_of(key).is_some()
    }

    /// Returns true if a tombstone for `key` is queued.
    pub fn is_deleted(&self, key: &EntityKey) -> bool {
        self.deleted_entities.contains(key)
    }

    /// Keys of queued deltas, in order.
    pub fn entity_keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.iter().map(|delta| &delta.key)
    }
}
