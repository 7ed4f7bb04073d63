//! Main conversation server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::session::SessionConversations;
use convsync_engine::{AllowAll, Conversation, TransferableEntity, VisibilityPolicy};
use convsync_protocol::{
    EndConversationRequest, PollRequest, PollResponse, StartConversationRequest,
    StartConversationResponse, SyncMessage,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// The conversation server.
///
/// Holds the conversations of every open session, serves start/poll/end
/// requests and evicts idle conversations.
///
/// # Example
///
/// ```
/// use convsync_engine::AllowAll;
/// use convsync_protocol::{PollRequest, StartConversationRequest};
/// use convsync_server::{ConversationServer, ServerConfig};
///
/// # #[derive(Clone)] struct Doc;
/// # impl convsync_engine::TransferableEntity for Doc {
/// #     fn key(&self) -> convsync_engine::EntityKey { convsync_engine::EntityKey::new("Doc", "1") }
/// #     fn last_modified(&self) -> convsync_engine::Revision { convsync_engine::Revision::new(1) }
/// #     fn slaves(&self) -> Vec<Self> { Vec::new() }
/// #     fn is_persistent(&self) -> bool { true }
/// #     fn properties(&self) -> convsync_engine::PropertyMap { Default::default() }
/// # }
/// let server: ConversationServer<String, Doc> =
///     ConversationServer::new(ServerConfig::default(), AllowAll);
/// let session_id = server.open_session("alice".to_string());
///
/// let started = server
///     .handle_start_conversation(StartConversationRequest::new(session_id))
///     .unwrap();
/// server
///     .conversation(session_id, started.conversation_number)
///     .unwrap()
///     .disclose(&Doc)
///     .unwrap();
///
/// let poll = server
///     .handle_poll(PollRequest::new(session_id, started.conversation_number))
///     .unwrap();
/// assert_eq!(poll.batch.unwrap().entities.len(), 1);
/// ```
pub struct ConversationServer<S, E, P = AllowAll> {
    handler: RequestHandler<S, E, P>,
    context: Arc<HandlerContext<S, E, P>>,
}

impl<S, E, P: Clone> ConversationServer<S, E, P> {
    /// Creates a new server.
    pub fn new(config: ServerConfig, policy: P) -> Self {
        let context = Arc::new(HandlerContext::new(config, policy));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// The configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Opens a session and returns its id.
    pub fn open_session(&self, session: S) -> Uuid {
        self.context.open_session(session)
    }

    /// Closes a session, invalidating its conversations.
    pub fn close_session(&self, session_id: &Uuid) -> bool {
        self.context.close_session(session_id)
    }

    /// Conversations of a session.
    pub fn session(&self, session_id: &Uuid) -> ServerResult<Arc<SessionConversations<S, E, P>>> {
        self.context.session(session_id)
    }

    /// A live conversation, for application code that discloses entities.
    pub fn conversation(
        &self,
        session_id: Uuid,
        number: u32,
    ) -> ServerResult<Arc<Conversation<S, E, P>>> {
        self.context.session(&session_id)?.get(number)
    }

    /// Handles a start conversation request.
    pub fn handle_start_conversation(
        &self,
        request: StartConversationRequest,
    ) -> ServerResult<StartConversationResponse> {
        self.handler.handle_start_conversation(request)
    }

    /// Handles a poll request.
    pub fn handle_poll(&self, request: PollRequest) -> ServerResult<PollResponse> {
        self.handler.handle_poll(request)
    }

    /// Handles an end conversation request.
    pub fn handle_end_conversation(&self, request: EndConversationRequest) -> ServerResult<bool> {
        self.handler.handle_end_conversation(request)
    }

    /// Handles a message (dispatches to the matching handler).
    ///
    /// Ending a conversation has no response message.
    pub fn handle_message(&self, message: SyncMessage) -> ServerResult<Option<SyncMessage>> {
        match message {
            SyncMessage::StartConversationRequest(req) => self
                .handle_start_conversation(req)
                .map(|res| Some(SyncMessage::StartConversationResponse(res))),
            SyncMessage::PollRequest(req) => self
                .handle_poll(req)
                .map(|res| Some(SyncMessage::PollResponse(res))),
            SyncMessage::EndConversationRequest(req) => {
                self.handle_end_conversation(req).map(|_| None)
            }
            other => Err(ServerError::InvalidRequest(format!(
                "Unexpected message type: {}",
                other.type_code()
            ))),
        }
    }

    /// Evicts idle conversations in every session. Returns how many.
    pub fn reap_expired(&self) -> usize {
        self.context
            .sessions()
            .iter()
            .map(|session| session.reap_expired().len())
            .sum()
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.context.sessions().len()
    }

    /// Number of live conversations across all sessions.
    pub fn conversation_count(&self) -> usize {
        self.context
            .sessions()
            .iter()
            .map(|session| session.len())
            .sum()
    }
}

impl<S, E, P> ConversationServer<S, E, P>
where
    E: TransferableEntity,
    P: VisibilityPolicy<S, E> + Clone,
{
    /// Discloses `entities` to every conversation of a session that may see them.
    pub fn disclose_to_session(&self, session_id: &Uuid, entities: &[E]) -> ServerResult<usize> {
        self.context.session(session_id)?.disclose_to_all(entities)
    }
}

impl<S, E, P> ConversationServer<S, E, P>
where
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Spawns a task that reaps idle conversations every `reap_interval`.
    ///
    /// Must be called from within a Tokio runtime. The task ends once the
    /// server is dropped.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config().reap_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(server) = weak.upgrade() else {
                    break;
                };
                let reaped = server.reap_expired();
                if reaped > 0 {
                    debug!(reaped, "reaped idle conversations");
                }
            }
        })
    }
}
