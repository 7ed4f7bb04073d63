//! Server configuration.

use convsync_engine::{ConversationConfig, DEFAULT_TIMEOUT};
use std::time::Duration;

/// Configuration for the conversation server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Idle timeout of every conversation.
    pub conversation_timeout: Duration,
    /// How often the reaper looks for idle conversations.
    pub reap_interval: Duration,
    /// Maximum live conversations per session.
    pub max_conversations_per_session: usize,
    /// Whether sessions run in development mode.
    pub development_mode: bool,
}

impl ServerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            conversation_timeout: DEFAULT_TIMEOUT,
            reap_interval: Duration::from_secs(30),
            max_conversations_per_session: 32,
            development_mode: false,
        }
    }

    /// Sets the conversation idle timeout.
    pub fn with_conversation_timeout(mut self, timeout: Duration) -> Self {
        self.conversation_timeout = timeout;
        self
    }

    /// Sets the reaper interval.
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Sets the per-session conversation limit.
    pub fn with_max_conversations_per_session(mut self, max: usize) -> Self {
        self.max_conversations_per_session = max;
        self
    }

    /// Sets the development mode flag.
    pub fn with_development_mode(mut self, development_mode: bool) -> Self {
        self.development_mode = development_mode;
        self
    }

    /// Configuration handed to every new conversation.
    pub fn conversation_config(&self) -> ConversationConfig {
        ConversationConfig::new()
            .with_timeout(self.conversation_timeout)
            .with_development_mode(self.development_mode)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
