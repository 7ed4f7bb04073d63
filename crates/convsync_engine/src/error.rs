//! Error types for the conversation engine.

use convsync_protocol::EntityKey;
use thiserror::Error;

/// Result type for conversation operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while disclosing entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The visibility policy rejected the entity.
    ///
    /// Callers are expected to check visibility before disclosing.
    #[error("entity {entity} is not visible to conversation #{conversation}")]
    PermissionDenied {
        /// Rejected entity.
        entity: EntityKey,
        /// Conversation number.
        conversation: u32,
    },

    /// The entity reported an empty identity.
    #[error("entity of kind {kind} has no identity")]
    MissingIdentity {
        /// Entity kind.
        kind: String,
    },

    /// The conversation does not transfer entity data.
    #[error("conversation #{conversation} does not transfer entities")]
    TransferDisabled {
        /// Conversation number.
        conversation: u32,
    },

    /// The conversation was invalidated.
    #[error("conversation #{conversation} was invalidated")]
    Invalidated {
        /// Conversation number.
        conversation: u32,
    },
}

impl SyncError {
    /// Returns true if this error signals a bug in the caller.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SyncError::PermissionDenied { .. }
                | SyncError::MissingIdentity { .. }
                | SyncError::TransferDisabled { .. }
        )
    }
}
