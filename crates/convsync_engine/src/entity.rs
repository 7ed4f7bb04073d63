//! The entity contract consumed by the engine.

use convsync_protocol::{EntityKey, PropertyMap, Revision};

/// An application entity that can be mirrored on a client.
///
/// Entities are owned by the application. The engine only keeps their keys
/// and the revision it last delivered. Implementations are usually cheap
/// handles (an `Arc` or an id plus a store reference), since slaves are
/// returned by value.
pub trait TransferableEntity: Clone + Send + Sync {
    /// Stable identity. The id must not be empty.
    fn key(&self) -> EntityKey;

    /// Current "last modified" marker.
    fn last_modified(&self) -> Revision;

    /// Entities that must reach the client before this one.
    fn slaves(&self) -> Vec<Self>;

    /// Whether the entity still exists in the backing store.
    fn is_persistent(&self) -> bool;

    /// Unfiltered property mapping of the current state.
    fn properties(&self) -> PropertyMap;
}
