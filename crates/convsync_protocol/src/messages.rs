//! Messages exchanged between a client and the conversation server.

use crate::batch::TransferBatch;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conversation protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Start conversation request.
    StartConversationRequest(StartConversationRequest),
    /// Start conversation response.
    StartConversationResponse(StartConversationResponse),
    /// Poll request.
    PollRequest(PollRequest),
    /// Poll response.
    PollResponse(PollResponse),
    /// End conversation request.
    EndConversationRequest(EndConversationRequest),
}

impl SyncMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            SyncMessage::StartConversationRequest(_) => 1,
            SyncMessage::StartConversationResponse(_) => 2,
            SyncMessage::PollRequest(_) => 3,
            SyncMessage::PollResponse(_) => 4,
            SyncMessage::EndConversationRequest(_) => 5,
        }
    }
}

/// Request to open a new conversation inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartConversationRequest {
    /// Session the conversation belongs to.
    pub session_id: Uuid,
}

impl StartConversationRequest {
    /// Creates a new start request.
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id }
    }
}

/// Response to a start request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartConversationResponse {
    /// Number assigned to the new conversation.
    pub conversation_number: u32,
    /// Namespace token for client-minted entity ids.
    pub entity_id_base: String,
    /// Whether the session runs in development mode.
    pub development_mode: bool,
}

/// Request for the changes pending on a conversation.
///
/// Polling touches the conversation and drains its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    /// Session id.
    pub session_id: Uuid,
    /// Conversation number within the session.
    pub conversation_number: u32,
}

impl PollRequest {
    /// Creates a new poll request.
    pub fn new(session_id: Uuid, conversation_number: u32) -> Self {
        Self {
            session_id,
            conversation_number,
        }
    }
}

/// Response to a poll request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Drained batch, if the conversation transfers entity data.
    pub batch: Option<TransferBatch>,
    /// Error message if the poll could not be served.
    pub error: Option<String>,
}

impl PollResponse {
    /// Creates a successful poll response.
    pub fn success(batch: Option<TransferBatch>) -> Self {
        Self { batch, error: None }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            batch: None,
            error: Some(message.into()),
        }
    }

    /// Returns true if the poll was served.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Request to end a conversation and release its resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndConversationRequest {
    /// Session id.
    pub session_id: Uuid,
    /// Conversation number within the session.
    pub conversation_number: u32,
}

impl EndConversationRequest {
    /// Creates a new end request.
    pub fn new(session_id: Uuid, conversation_number: u32) -> Self {
        Self {
            session_id,
            conversation_number,
        }
    }
}
