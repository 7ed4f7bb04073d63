//! Request handlers for conversation endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::session::SessionConversations;
use convsync_engine::AllowAll;
use convsync_protocol::{
    EndConversationRequest, PollRequest, PollResponse, StartConversationRequest,
    StartConversationResponse,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Context for request handling.
pub struct HandlerContext<S, E, P = AllowAll> {
    /// Server configuration.
    pub config: ServerConfig,
    /// Policy cloned into every new conversation.
    pub policy: P,
    /// Open sessions (session_id -> conversations).
    sessions: RwLock<HashMap<Uuid, Arc<SessionConversations<S, E, P>>>>,
}

impl<S, E, P: Clone> HandlerContext<S, E, P> {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, policy: P) -> Self {
        Self {
            config,
            policy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a session and returns its id.
    pub fn open_session(&self, session: S) -> Uuid {
        let id = Uuid::new_v4();
        let conversations = SessionConversations::new(
            id,
            Arc::new(session),
            self.policy.clone(),
            self.config.clone(),
        );
        self.sessions.write().insert(id, Arc::new(conversations));
        info!(session = %id, "session opened");
        id
    }

    /// Drops a session and invalidates its conversations.
    pub fn close_session(&self, id: &Uuid) -> bool {
        let Some(session) = self.sessions.write().remove(id) else {
            return false;
        };
        let count = session.invalidate_all();
        info!(session = %id, conversations = count, "session closed");
        true
    }

    /// Looks up a session.
    pub fn session(&self, id: &Uuid) -> ServerResult<Arc<SessionConversations<S, E, P>>> {
        self.sessions
            .read()
            .get(id)
            .cloned()
            .ok_or(ServerError::UnknownSession(*id))
    }

    /// Snapshot of all sessions.
    pub fn sessions(&self) -> Vec<Arc<SessionConversations<S, E, P>>> {
        self.sessions.read().values().cloned().collect()
    }
}

/// Handler for conversation requests.
pub struct RequestHandler<S, E, P = AllowAll> {
    context: Arc<HandlerContext<S, E, P>>,
}

impl<S, E, P: Clone> RequestHandler<S, E, P> {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext<S, E, P>>) -> Self {
        Self { context }
    }

    /// Handles a start conversation request.
    pub fn handle_start_conversation(
        &self,
        request: StartConversationRequest,
    ) -> ServerResult<StartConversationResponse> {
        let session = self.context.session(&request.session_id)?;
        let conversation = session.create_conversation()?;
        let metadata = conversation.metadata();

        Ok(StartConversationResponse {
            conversation_number: conversation.number(),
            entity_id_base: metadata.entity_id_base.clone(),
            development_mode: metadata.development_mode,
        })
    }

    /// Handles a poll: touches the conversation and drains its batch.
    ///
    /// A conversation that is gone (expired or ended) yields an error
    /// response rather than a failure, so the client can start a new one.
    pub fn handle_poll(&self, request: PollRequest) -> ServerResult<PollResponse> {
        let session = self.context.session(&request.session_id)?;
        match session.touch(request.conversation_number) {
            Ok(conversation) => Ok(PollResponse::success(conversation.drain())),
            Err(ServerError::UnknownConversation { number, .. }) => Ok(PollResponse::error(
                format!("Conversation #{} expired", number),
            )),
            Err(e) => Err(e),
        }
    }

    /// Handles an end conversation request. Returns false if it was gone.
    pub fn handle_end_conversation(&self, request: EndConversationRequest) -> ServerResult<bool> {
        let session = self.context.session(&request.session_id)?;
        Ok(session.remove(request.conversation_number).is_some())
    }
}
