//! Tracking of what the client already holds.

use convsync_protocol::{EntityKey, Revision};
use std::collections::HashMap;

/// What was delivered for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A delta carrying this revision.
    Revision(Revision),
    /// A tombstone.
    Deleted,
}

/// Map from entity key to the revision last delivered to the client.
///
/// Not synchronized on its own: a conversation keeps it next to its pending
/// batch under one lock.
#[derive(Debug, Default, Clone)]
pub struct RemoteStateTracker {
    revisions: HashMap<EntityKey, Revision>,
}

impl RemoteStateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the client holds any revision of `key`.
    pub fn is_known(&self, key: &EntityKey) -> bool {
        self.revisions.contains_key(key)
    }

    /// Revision the client holds for `key`.
    pub fn revision(&self, key: &EntityKey) -> Option<Revision> {
        self.revisions.get(key).copied()
    }

    /// Returns true if the client already holds exactly `revision`.
    pub fn is_up_to_date(&self, key: &EntityKey, revision: Revision) -> bool {
        self.revision(key) == Some(revision)
    }

    /// Records a delivery.
    ///
    /// Tombstones forget the key: a deleted entity has no future revision
    /// to compare against.
    pub fn mark_delivered(&mut self, key: EntityKey, delivery: Delivery) {
        match delivery {
            Delivery::Revision(revision) => {
                self.revisions.insert(key, revision);
            }
            Delivery::Deleted => {
                self.revisions.remove(&key);
            }
        }
    }

    /// Forgets one entity. Returns true if it was tracked.
    pub fn forget(&mut self, key: &EntityKey) -> bool {
        self.revisions.remove(key).is_some()
    }

    /// Forgets every entity of exactly `kind`. Returns how many were dropped.
    pub fn forget_all_of_type(&mut self, kind: &str) -> usize {
        let before = self.revisions.len();
        self.revisions.retain(|key, _| !key.is_kind(kind));
        before - self.revisions.len()
    }

    /// Forgets everything.
    pub fn clear_all(&mut self) {
        self.revisions.clear();
    }

    /// Number of tracked entities.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Tracked keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.revisions.keys()
    }
}
