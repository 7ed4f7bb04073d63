//! # convsync Server
//!
//! The session side of convsync: keeps the conversations of every session,
//! serves polls and reaps idle conversations.
//!
//! This crate provides:
//! - Per-session conversation registries with numbering and recency order
//! - Request handlers (start, poll, end)
//! - A multi-session server with a periodic idle reaper
//!
//! # Protocol
//!
//! 1. The application opens a session and the client starts a conversation
//! 2. Application threads disclose entities to the conversation at any time
//! 3. Each client poll touches the conversation and drains its batch
//! 4. Conversations idle for longer than the timeout are invalidated and dropped
//!
//! ```rust,ignore
//! use convsync_server::{ConversationServer, ServerConfig};
//!
//! let server = Arc::new(ConversationServer::new(ServerConfig::default(), AllowAll));
//! let session_id = server.open_session(user);
//! let started = server.handle_start_conversation(StartConversationRequest::new(session_id))?;
//! let _reaper = server.spawn_reaper();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;
mod session;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::ConversationServer;
pub use session::SessionConversations;
