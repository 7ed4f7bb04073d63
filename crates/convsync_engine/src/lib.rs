//! # convsync Engine
//!
//! Keeps a remote client's view of a changing set of server-side entities
//! consistent, one conversation at a time.
//!
//! This crate provides:
//! - The entity contract consumed from the application (`TransferableEntity`)
//! - Pluggable visibility and property filtering (`VisibilityPolicy`)
//! - Tracking of what the client already has (`RemoteStateTracker`)
//! - The conversation itself: disclosure, drain, touch/expiry bookkeeping
//!
//! ## Disclosure
//!
//! Disclosing an entity queues its filtered properties for the client unless
//! the client already holds the same revision. Slave entities are disclosed
//! first, so the client never receives a reference to an object it does not
//! know. Deleted entities always produce a tombstone.
//!
//! ## Key Invariants
//!
//! - Remote state and the pending batch are updated in one critical section
//! - A drain swaps the batch atomically: every delta lands in exactly one drain
//! - Each entity is processed at most once per disclosure, cycles terminate
//! - Deletions propagate without a visibility check

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod conversation;
mod entity;
mod error;
mod lifecycle;
mod policy;
mod tracker;

pub use config::{ConversationConfig, DEFAULT_TIMEOUT};
pub use conversation::{Conversation, ConversationStats};
pub use entity::TransferableEntity;
pub use error::{SyncError, SyncResult};
pub use lifecycle::Recency;
pub use policy::{AllowAll, ConversationView, FnPolicy, VisibilityPolicy};
pub use tracker::{Delivery, RemoteStateTracker};

pub use convsync_protocol::{
    BatchMetadata, EntityDelta, EntityKey, PropertyMap, Revision, TransferBatch,
};
