//! Configuration for conversations.

use std::time::Duration;

/// Idle time after which a conversation counts as expired.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Configuration for a single conversation.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Idle timeout.
    pub timeout: Duration,
    /// Whether the owning session runs in development mode.
    pub development_mode: bool,
    /// Whether the conversation transfers entity data at all.
    pub transfers_entities: bool,
}

impl ConversationConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            development_mode: false,
            transfers_entities: true,
        }
    }

    /// Sets the idle timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the development mode flag.
    pub fn with_development_mode(mut self, development_mode: bool) -> Self {
        self.development_mode = development_mode;
        self
    }

    /// Disables entity transfer: drains return nothing.
    pub fn without_entity_transfer(mut self) -> Self {
        self.transfers_entities = false;
        self
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self::new()
    }
}
