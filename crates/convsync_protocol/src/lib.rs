//! # convsync Protocol
//!
//! Transferable types shared between the conversation engine and the
//! transport layer that ships batches to clients.
//!
//! This crate provides:
//! - `EntityKey` and `Revision` for identifying entities and their state
//! - `EntityDelta` and `TransferBatch`, the unit handed to the transport
//! - Request/response messages for starting, polling and ending conversations
//!
//! No wire encoding is fixed here. Every type derives `serde` traits so the
//! transport can pick its own format.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod entity;
mod messages;

pub use batch::{BatchMetadata, TransferBatch};
pub use entity::{EntityDelta, EntityKey, PropertyMap, Revision};
pub use messages::{
    EndConversationRequest, PollRequest, PollResponse, StartConversationRequest,
    StartConversationResponse, SyncMessage,
};
