//! Error types for the conversation server.

use convsync_engine::SyncError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the conversation server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No session with this id.
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),

    /// No live conversation with this number.
    #[error("unknown conversation #{number} in session {session}")]
    UnknownConversation {
        /// Session id.
        session: Uuid,
        /// Conversation number.
        number: u32,
    },

    /// The session reached its conversation limit.
    #[error("session {session} already has {limit} conversations")]
    TooManyConversations {
        /// Session id.
        session: Uuid,
        /// Configured limit.
        limit: usize,
    },

    /// Disclosure failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ServerError {
    /// Returns true if the client caused the error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::UnknownSession(_)
                | ServerError::UnknownConversation { .. }
                | ServerError::TooManyConversations { .. }
        )
    }

    /// Returns true if the server side caused the error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Sync(_))
    }
}
