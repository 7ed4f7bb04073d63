//! The conversation: disclosure, drain and lifecycle of one client view.

use crate::config::ConversationConfig;
use crate::entity::TransferableEntity;
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::{Recency, TouchClock};
use crate::policy::{AllowAll, ConversationView, VisibilityPolicy};
use crate::tracker::{Delivery, RemoteStateTracker};
use convsync_protocol::{BatchMetadata, EntityDelta, EntityKey, Revision, TransferBatch};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Counters kept by a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStats {
    /// Entity deltas queued.
    pub entities_sent: u64,
    /// Tombstones queued.
    pub tombstones_sent: u64,
    /// Disclosures skipped because the client was up to date.
    pub skipped_unchanged: u64,
    /// Batches drained.
    pub drains: u64,
}

/// Everything guarded by the conversation lock.
struct ConversationState {
    remote: RemoteStateTracker,
    /// `None` when the conversation transfers no entity data, or after
    /// invalidation.
    pending: Option<TransferBatch>,
    stats: ConversationStats,
    invalidated: bool,
    /// Taken in the same critical section that sets `invalidated`.
    release_hooks: Vec<ReleaseHook>,
}

enum Step<E> {
    Visit(E),
    Emit(E, EntityKey),
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Synchronization context between the server and one client view.
///
/// A conversation remembers which entities the client already holds and at
/// which revision, and stages deltas until the transport drains them. It is
/// shared between request threads: `disclose` and `drain` may be called
/// concurrently and are serialized by one lock.
///
/// # Example
///
/// ```
/// use convsync_engine::{
///     AllowAll, Conversation, ConversationConfig, EntityKey, PropertyMap, Revision,
///     TransferableEntity,
/// };
/// use std::sync::Arc;
///
/// #[derive(Clone)]
/// struct Note { id: String, rev: u64 }
///
/// impl TransferableEntity for Note {
///     fn key(&self) -> EntityKey { EntityKey::new("Note", self.id.clone()) }
///     fn last_modified(&self) -> Revision { Revision::new(self.rev) }
///     fn slaves(&self) -> Vec<Self> { Vec::new() }
///     fn is_persistent(&self) -> bool { true }
///     fn properties(&self) -> PropertyMap { PropertyMap::new() }
/// }
///
/// let conversation: Conversation<(), Note> =
///     Conversation::new(Arc::new(()), 1, AllowAll, ConversationConfig::default());
///
/// let note = Note { id: "n1".into(), rev: 1 };
/// conversation.disclose(&note).unwrap();
/// conversation.disclose(&note).unwrap();
///
/// let batch = conversation.drain().unwrap();
/// assert_eq!(batch.entities.len(), 1);
/// ```
pub struct Conversation<S, E, P = AllowAll> {
    number: u32,
    session: Arc<S>,
    policy: P,
    config: ConversationConfig,
    metadata: BatchMetadata,
    clock: TouchClock,
    state: Mutex<ConversationState>,
    _entity: PhantomData<fn(E)>,
}

impl<S, E, P> Conversation<S, E, P> {
    /// Creates a conversation and touches it.
    pub fn new(session: Arc<S>, number: u32, policy: P, config: ConversationConfig) -> Self {
        let metadata = BatchMetadata::new(number, config.development_mode);
        let pending = config
            .transfers_entities
            .then(|| TransferBatch::new(metadata.clone()));

        Self {
            number,
            session,
            policy,
            clock: TouchClock::new(Instant::now(), config.timeout),
            config,
            metadata,
            state: Mutex::new(ConversationState {
                remote: RemoteStateTracker::new(),
                pending,
                stats: ConversationStats::default(),
                invalidated: false,
                release_hooks: Vec::new(),
            }),
            _entity: PhantomData,
        }
    }

    /// Number of this conversation within its session.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The owning session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// The configuration.
    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// The visibility policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Metadata stamped on every batch of this conversation.
    pub fn metadata(&self) -> &BatchMetadata {
        &self.metadata
    }

    /// Read-only view handed to policies.
    pub fn view(&self) -> ConversationView<'_, S> {
        ConversationView {
            number: self.number,
            session: &self.session,
            development_mode: self.config.development_mode,
        }
    }

    /// Takes the pending batch and installs a fresh one.
    ///
    /// Returns `None` without side effects if the conversation transfers no
    /// entity data or was invalidated.
    pub fn drain(&self) -> Option<TransferBatch> {
        let mut state = self.state.lock();
        let pending = state.pending.as_mut()?;
        let drained = std::mem::replace(pending, TransferBatch::new(self.metadata.clone()));
        state.stats.drains += 1;

        debug!(
            conversation = self.number,
            entities = drained.entities.len(),
            deleted = drained.deleted_entities.len(),
            "drained batch"
        );
        Some(drained)
    }

    /// Number of deltas and tombstones waiting for the next drain.
    pub fn pending_len(&self) -> usize {
        self.state
            .lock()
            .pending
            .as_ref()
            .map_or(0, TransferBatch::len)
    }

    /// Forgets everything the client was known to hold.
    pub fn clear_remote_entities(&self) {
        self.state.lock().remote.clear_all();
    }

    /// Forgets the client state for entities of exactly `kind`.
    pub fn clear_remote_entities_by_type(&self, kind: &str) -> usize {
        self.state.lock().remote.forget_all_of_type(kind)
    }

    /// Number of entities the client is known to hold.
    pub fn remote_entity_count(&self) -> usize {
        self.state.lock().remote.len()
    }

    /// Marks activity now.
    pub fn touch(&self) {
        self.clock.touch_at(Instant::now());
    }

    /// Marks activity at `now`.
    pub fn touch_at(&self, now: Instant) {
        self.clock.touch_at(now);
    }

    /// Time of the last activity.
    pub fn last_touched(&self) -> Instant {
        self.clock.last_touched()
    }

    /// Idle timeout.
    pub fn timeout(&self) -> Duration {
        self.clock.timeout()
    }

    /// Returns true if idle for longer than the timeout.
    pub fn is_expired(&self) -> bool {
        self.clock.is_expired_at(Instant::now())
    }

    /// Returns true if idle for longer than the timeout at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.clock.is_expired_at(now)
    }

    /// Recency stamp for ordering conversations.
    pub fn recency(&self) -> Recency {
        Recency {
            last_touched: self.clock.last_touched(),
            number: self.number,
        }
    }

    /// Counters.
    pub fn stats(&self) -> ConversationStats {
        self.state.lock().stats.clone()
    }

    /// Registers a hook run once when the conversation is invalidated.
    ///
    /// Runs immediately if the conversation is already invalidated.
    pub fn on_invalidate(&self, hook: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if !state.invalidated {
                state.release_hooks.push(Box::new(hook));
                return;
            }
        }
        hook();
    }

    /// Releases the conversation: pending data and remote state are dropped,
    /// release hooks run, further disclosures fail.
    pub fn invalidate(&self) {
        let hooks = {
            let mut state = self.state.lock();
            if state.invalidated {
                return;
            }
            state.invalidated = true;
            state.pending = None;
            state.remote.clear_all();
            std::mem::take(&mut state.release_hooks)
        };

        for hook in hooks {
            hook();
        }
        info!(conversation = self.number, "conversation invalidated");
    }

    /// Returns true once `invalidate` was called.
    pub fn is_invalidated(&self) -> bool {
        self.state.lock().invalidated
    }
}

impl<S, E, P> Conversation<S, E, P>
where
    E: TransferableEntity,
    P: VisibilityPolicy<S, E>,
{
    /// Returns true if the policy lets this conversation see `entity`.
    pub fn is_visible(&self, entity: &E) -> bool {
        self.policy.is_visible(entity, &self.view())
    }

    /// Returns true if the client holds any revision of `entity`.
    pub fn is_available_on_client(&self, entity: &E) -> bool {
        self.state.lock().remote.is_known(&entity.key())
    }

    /// Revision of `entity` the client holds.
    pub fn remote_revision(&self, entity: &E) -> Option<Revision> {
        self.state.lock().remote.revision(&entity.key())
    }

    /// Queues `entity` and its slaves for the client, as far as needed.
    ///
    /// Deleted entities produce a tombstone without a visibility check.
    /// Slaves are queued before the entity that needs them; entities the
    /// client holds at the current revision are skipped. The whole
    /// traversal runs under the conversation lock, and every entity is
    /// visited at most once, so slave cycles terminate.
    ///
    /// Fails with [`SyncError::PermissionDenied`] if a persistent entity on
    /// the way is not visible. Deltas queued before the failure stay queued.
    pub fn disclose(&self, entity: &E) -> SyncResult<()> {
        let view = self.view();
        let mut state = self.state.lock();
        if state.invalidated {
            return Err(SyncError::Invalidated {
                conversation: self.number,
            });
        }

        let ConversationState {
            remote,
            pending,
            stats,
            ..
        } = &mut *state;
        let batch = pending.as_mut().ok_or(SyncError::TransferDisabled {
            conversation: self.number,
        })?;

        let mut visited = HashSet::new();
        let mut stack = vec![Step::Visit(entity.clone())];

        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(entity) => {
                    let key = entity.key();
                    if key.id().is_empty() {
                        return Err(SyncError::MissingIdentity {
                            kind: key.kind().to_string(),
                        });
                    }
                    if !visited.insert(key.clone()) {
                        continue;
                    }

                    if !entity.is_persistent() {
                        batch.add_deleted_entity(key.clone());
                        debug!(conversation = self.number, entity = %key, "sending tombstone");
                        remote.mark_delivered(key, Delivery::Deleted);
                        stats.tombstones_sent += 1;
                        continue;
                    }

                    if !self.policy.is_visible(&entity, &view) {
                        warn!(conversation = self.number, entity = %key, "entity is not visible");
                        return Err(SyncError::PermissionDenied {
                            entity: key,
                            conversation: self.number,
                        });
                    }

                    let slaves = entity.slaves();
                    stack.push(Step::Emit(entity, key));
                    stack.extend(slaves.into_iter().rev().map(Step::Visit));
                }
                Step::Emit(entity, key) => {
                    let revision = entity.last_modified();
                    if remote.is_up_to_date(&key, revision) {
                        debug!(
                            conversation = self.number,
                            entity = %key,
                            "remote entity already up to date"
                        );
                        stats.skipped_unchanged += 1;
                        continue;
                    }

                    let mut properties = entity.properties();
                    self.policy
                        .filter_properties(&entity, &view, &mut properties);

                    debug!(conversation = self.number, entity = %key, %revision, "sending entity");
                    batch.add_entity(EntityDelta::new(key.clone(), properties));
                    remote.mark_delivered(key, Delivery::Revision(revision));
                    stats.entities_sent += 1;
                }
            }
        }

        Ok(())
    }

    /// Discloses each entity on its own, in order. Stops at the first error.
    pub fn disclose_all<'a, I>(&self, entities: I) -> SyncResult<()>
    where
        I: IntoIterator<Item = &'a E>,
        E: 'a,
    {
        for entity in entities {
            self.disclose(entity)?;
        }
        Ok(())
    }
}

impl<S: fmt::Display, E, P> fmt::Display for Conversation<S, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.number, self.session)
    }
}

impl<S, E, P> fmt::Debug for Conversation<S, E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("number", &self.number)
            .field("metadata", &self.metadata)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FnPolicy;
    use convsync_protocol::PropertyMap;
    use parking_lot::RwLock;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Node(Arc<NodeInner>);

    struct NodeInner {
        kind: &'static str,
        id: String,
        revision: RwLock<u64>,
        persistent: AtomicBool,
        slaves: RwLock<Vec<Node>>,
    }

    impl Node {
        fn new(kind: &'static str, id: &str) -> Self {
            Node(Arc::new(NodeInner {
                kind,
                id: id.to_string(),
                revision: RwLock::new(1),
                persistent: AtomicBool::new(true),
                slaves: RwLock::new(Vec::new()),
            }))
        }

        fn with_slave(self, slave: &Node) -> Self {
            self.0.slaves.write().push(slave.clone());
            self
        }

        fn bump(&self) {
            *self.0.revision.write() += 1;
        }

        fn delete(&self) {
            self.0.persistent.store(false, Ordering::SeqCst);
        }
    }

    impl TransferableEntity for Node {
        fn key(&self) -> EntityKey {
            EntityKey::new(self.0.kind, self.0.id.clone())
        }

        fn last_modified(&self) -> Revision {
            Revision::new(*self.0.revision.read())
        }

        fn slaves(&self) -> Vec<Self> {
            self.0.slaves.read().clone()
        }

        fn is_persistent(&self) -> bool {
            self.0.persistent.load(Ordering::SeqCst)
        }

        fn properties(&self) -> PropertyMap {
            let mut props = PropertyMap::new();
            props.insert("id".into(), json!(self.0.id));
            props.insert("secret".into(), json!("hidden"));
            props
        }
    }

    fn conversation() -> Conversation<String, Node> {
        Conversation::new(
            Arc::new("alice".to_string()),
            1,
            AllowAll,
            ConversationConfig::default(),
        )
    }

    fn ids(batch: &TransferBatch) -> Vec<String> {
        batch.entity_keys().map(|k| k.id().to_string()).collect()
    }

    #[test]
    fn redisclosure_is_idempotent() {
        let conv = conversation();
        let a = Node::new("Task", "a");

        conv.disclose(&a).unwrap();
        conv.disclose(&a).unwrap();

        let batch = conv.drain().unwrap();
        assert_eq!(ids(&batch), vec!["a"]);
        assert_eq!(conv.stats().skipped_unchanged, 1);
    }

    #[test]
    fn slaves_come_first() {
        let conv = conversation();
        let b = Node::new("Task", "b");
        let a = Node::new("Story", "a").with_slave(&b);

        conv.disclose(&a).unwrap();
        let batch = conv.drain().unwrap();
        assert_eq!(ids(&batch), vec!["b", "a"]);
    }

    #[test]
    fn scenario_drain_then_redisclose() {
        let conv = conversation();
        let b = Node::new("Task", "b");
        let a = Node::new("Story", "a").with_slave(&b);

        conv.disclose(&a).unwrap();
        let first = conv.drain().unwrap();
        assert_eq!(ids(&first), vec!["b", "a"]);
        assert_eq!(conv.remote_revision(&a), Some(Revision::new(1)));
        assert_eq!(conv.remote_revision(&b), Some(Revision::new(1)));

        conv.disclose(&a).unwrap();
        let second = conv.drain().unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn new_revision_is_resent() {
        let conv = conversation();
        let a = Node::new("Task", "a");
        conv.disclose(&a).unwrap();
        conv.drain();

        a.bump();
        conv.disclose(&a).unwrap();
        let batch = conv.drain().unwrap();
        assert_eq!(ids(&batch), vec!["a"]);
        assert_eq!(conv.remote_revision(&a), Some(Revision::new(2)));
    }

    #[test]
    fn deleted_entity_sends_tombstone_without_visibility_check() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let conv: Conversation<String, Node, _> = Conversation::new(
            Arc::new("bob".to_string()),
            2,
            FnPolicy::new(
                move |_: &Node, _: &ConversationView<'_, String>| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                },
                |_: &Node, _: &ConversationView<'_, String>, _: &mut PropertyMap| {},
            ),
            ConversationConfig::default(),
        );

        let a = Node::new("Task", "a");
        a.delete();
        conv.disclose(&a).unwrap();

        let batch = conv.drain().unwrap();
        assert!(batch.entities.is_empty());
        assert!(batch.is_deleted(&a.key()));
        assert_eq!(checks.load(Ordering::SeqCst), 0);
        assert!(!conv.is_available_on_client(&a));
    }

    #[test]
    fn invisible_entity_is_denied() {
        let conv: Conversation<String, Node, _> = Conversation::new(
            Arc::new("bob".to_string()),
            2,
            FnPolicy::new(
                |node: &Node, _: &ConversationView<'_, String>| node.key().kind() != "Secret",
                |_: &Node, _: &ConversationView<'_, String>, props: &mut PropertyMap| {
                    props.remove("secret");
                },
            ),
            ConversationConfig::default(),
        );

        let hidden = Node::new("Secret", "s");
        let err = conv.disclose(&hidden).unwrap_err();
        assert_eq!(
            err,
            SyncError::PermissionDenied {
                entity: hidden.key(),
                conversation: 2
            }
        );
        assert!(!conv.is_visible(&hidden));

        let open = Node::new("Task", "t");
        conv.disclose(&open).unwrap();
        let batch = conv.drain().unwrap();
        assert!(batch.entities[0].property("secret").is_none());
        assert_eq!(batch.entities[0].property("id"), Some(&json!("t")));
    }

    #[test]
    fn slave_cycle_terminates() {
        let conv = conversation();
        let a = Node::new("Task", "a");
        let b = Node::new("Task", "b").with_slave(&a);
        a.0.slaves.write().push(b.clone());

        conv.disclose(&a).unwrap();
        let batch = conv.drain().unwrap();
        assert_eq!(ids(&batch), vec!["b", "a"]);
    }

    #[test]
    fn missing_identity_is_rejected() {
        let conv = conversation();
        let nameless = Node::new("Task", "");
        assert!(matches!(
            conv.disclose(&nameless),
            Err(SyncError::MissingIdentity { .. })
        ));
    }

    #[test]
    fn disabled_transfer_drains_nothing() {
        let conv: Conversation<String, Node> = Conversation::new(
            Arc::new("carol".to_string()),
            3,
            AllowAll,
            ConversationConfig::new().without_entity_transfer(),
        );

        assert!(conv.drain().is_none());
        assert_eq!(conv.stats().drains, 0);
        assert_eq!(
            conv.disclose(&Node::new("Task", "a")),
            Err(SyncError::TransferDisabled { conversation: 3 })
        );
    }

    #[test]
    fn fresh_batches_keep_metadata() {
        let conv = conversation();
        let first = conv.drain().unwrap();
        let second = conv.drain().unwrap();
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.metadata.conversation_number, 1);
        assert_eq!(conv.stats().drains, 2);
    }

    #[test]
    fn clear_by_type_forces_resend() {
        let conv = conversation();
        let task = Node::new("Task", "t");
        let story = Node::new("Story", "s");
        conv.disclose_all([&task, &story]).unwrap();
        conv.drain();

        assert_eq!(conv.clear_remote_entities_by_type("Task"), 1);
        conv.disclose_all([&task, &story]).unwrap();
        assert_eq!(ids(&conv.drain().unwrap()), vec!["t"]);

        conv.clear_remote_entities();
        assert_eq!(conv.remote_entity_count(), 0);
    }

    #[test]
    fn invalidate_runs_hooks_once() {
        let conv = conversation();
        let released = Arc::new(AtomicUsize::new(0));
        let hook_counter = Arc::clone(&released);
        conv.on_invalidate(move || {
            hook_counter.fetch_add(1, Ordering::SeqCst);
        });

        conv.disclose(&Node::new("Task", "a")).unwrap();
        conv.invalidate();
        conv.invalidate();

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(conv.drain().is_none());
        assert_eq!(
            conv.disclose(&Node::new("Task", "b")),
            Err(SyncError::Invalidated { conversation: 1 })
        );
    }

    #[test]
    fn display_and_expiry() {
        let conv = conversation();
        assert_eq!(conv.to_string(), "#1@alice");

        let t = Instant::now();
        conv.touch_at(t);
        assert!(!conv.is_expired_at(t + conv.timeout() - Duration::from_millis(1)));
        assert!(conv.is_expired_at(t + conv.timeout() + Duration::from_millis(1)));
        assert_eq!(conv.recency().last_touched, t);
    }
}
