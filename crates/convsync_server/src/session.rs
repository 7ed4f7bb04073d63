//! Conversations of one session.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use convsync_engine::{
    AllowAll, Conversation, SyncError, TransferableEntity, VisibilityPolicy,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Registry of the live conversations of one session.
///
/// Conversation numbers start at 1 and are never reused within a session.
pub struct SessionConversations<S, E, P = AllowAll> {
    id: Uuid,
    session: Arc<S>,
    policy: P,
    config: ServerConfig,
    next_number: AtomicU32,
    conversations: RwLock<HashMap<u32, Arc<Conversation<S, E, P>>>>,
}

impl<S, E, P: Clone> SessionConversations<S, E, P> {
    /// Creates an empty registry.
    pub fn new(id: Uuid, session: Arc<S>, policy: P, config: ServerConfig) -> Self {
        Self {
            id,
            session,
            policy,
            config,
            next_number: AtomicU32::new(1),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Starts a new conversation.
    pub fn create_conversation(&self) -> ServerResult<Arc<Conversation<S, E, P>>> {
        let mut conversations = self.conversations.write();
        let limit = self.config.max_conversations_per_session;
        if conversations.len() >= limit {
            return Err(ServerError::TooManyConversations {
                session: self.id,
                limit,
            });
        }

        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let conversation = Arc::new(Conversation::new(
            Arc::clone(&self.session),
            number,
            self.policy.clone(),
            self.config.conversation_config(),
        ));
        conversations.insert(number, Arc::clone(&conversation));

        info!(session = %self.id, conversation = number, "conversation started");
        Ok(conversation)
    }

    /// Looks up a live conversation.
    pub fn get(&self, number: u32) -> ServerResult<Arc<Conversation<S, E, P>>> {
        self.conversations
            .read()
            .get(&number)
            .cloned()
            .ok_or(ServerError::UnknownConversation {
                session: self.id,
                number,
            })
    }

    /// Looks up a live conversation and marks activity on it.
    pub fn touch(&self, number: u32) -> ServerResult<Arc<Conversation<S, E, P>>> {
        let conversation = self.get(number)?;
        conversation.touch();
        Ok(conversation)
    }

    /// Drops a conversation and invalidates it.
    pub fn remove(&self, number: u32) -> Option<Arc<Conversation<S, E, P>>> {
        let conversation = self.conversations.write().remove(&number)?;
        conversation.invalidate();
        Some(conversation)
    }

    /// Live conversations, most recently touched first.
    pub fn by_recency(&self) -> Vec<Arc<Conversation<S, E, P>>> {
        let mut conversations: Vec<_> = self.conversations.read().values().cloned().collect();
        conversations.sort_by_key(|conversation| conversation.recency());
        conversations
    }

    /// Drops every conversation idle at `now`. Returns their numbers.
    pub fn reap_expired_at(&self, now: Instant) -> Vec<u32> {
        let expired: Vec<_> = {
            let mut conversations = self.conversations.write();
            let numbers: Vec<u32> = conversations
                .values()
                .filter(|conversation| conversation.is_expired_at(now))
                .map(|conversation| conversation.number())
                .collect();
            numbers
                .iter()
                .filter_map(|number| conversations.remove(number))
                .collect()
        };

        let mut numbers = Vec::with_capacity(expired.len());
        for conversation in expired {
            conversation.invalidate();
            debug!(session = %self.id, conversation = conversation.number(), "conversation expired");
            numbers.push(conversation.number());
        }
        numbers.sort_unstable();
        numbers
    }

    /// Drops every conversation idle now.
    pub fn reap_expired(&self) -> Vec<u32> {
        self.reap_expired_at(Instant::now())
    }

    /// Drops and invalidates all conversations. Returns how many there were.
    pub fn invalidate_all(&self) -> usize {
        let drained: Vec<_> = self.conversations.write().drain().map(|(_, c)| c).collect();
        for conversation in &drained {
            conversation.invalidate();
        }
        drained.len()
    }

    /// Number of live conversations.
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    /// Returns true if no conversation is live.
    pub fn is_empty(&self) -> bool {
        self.conversations.read().is_empty()
    }
}

impl<S, E, P> SessionConversations<S, E, P>
where
    E: TransferableEntity,
    P: VisibilityPolicy<S, E> + Clone,
{
    /// Discloses `entities` to every conversation allowed to see them.
    ///
    /// Deleted entities go to every conversation. An entity that is hidden
    /// from a conversation, itself or through one of its slaves, is skipped
    /// for that conversation only; slaves queued before the hidden one stay
    /// queued. Conversations invalidated concurrently are skipped. Returns
    /// the number of successful disclosures.
    pub fn disclose_to_all(&self, entities: &[E]) -> ServerResult<usize> {
        let mut disclosures = 0;
        'conversations: for conversation in self.by_recency() {
            for entity in entities {
                if entity.is_persistent() && !conversation.is_visible(entity) {
                    continue;
                }
                match conversation.disclose(entity) {
                    Ok(()) => disclosures += 1,
                    Err(SyncError::PermissionDenied { entity: hidden, .. }) => {
                        debug!(
                            session = %self.id,
                            conversation = conversation.number(),
                            entity = %hidden,
                            "skipping entity with hidden slave"
                        );
                    }
                    Err(SyncError::Invalidated { .. }) => continue 'conversations,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(disclosures)
    }
}
