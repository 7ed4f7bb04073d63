//! Test fixtures: entities, sessions and policies.

use convsync_engine::{
    Conversation, ConversationConfig, ConversationView, EntityKey, PropertyMap, Revision,
    TransferableEntity, VisibilityPolicy,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// A mutable, shareable entity for tests.
///
/// Clones share state, so bumping the revision of one handle is visible
/// through all of them.
#[derive(Clone)]
pub struct TestEntity(Arc<Inner>);

struct Inner {
    kind: String,
    id: String,
    revision: AtomicU64,
    persistent: AtomicBool,
    slaves: RwLock<Vec<TestEntity>>,
    properties: RwLock<PropertyMap>,
}

impl TestEntity {
    /// Creates a persistent entity at revision 1.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self(Arc::new(Inner {
            kind: kind.into(),
            id: id.into(),
            revision: AtomicU64::new(1),
            persistent: AtomicBool::new(true),
            slaves: RwLock::new(Vec::new()),
            properties: RwLock::new(PropertyMap::new()),
        }))
    }

    /// Adds a slave and returns self.
    pub fn with_slave(self, slave: &TestEntity) -> Self {
        self.add_slave(slave);
        self
    }

    /// Sets a property and returns self.
    pub fn with_property(self, name: &str, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Adds a slave.
    pub fn add_slave(&self, slave: &TestEntity) {
        self.0.slaves.write().push(slave.clone());
    }

    /// Sets a property and bumps the revision.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        self.0.properties.write().insert(name.to_string(), value.into());
        self.bump();
    }

    /// Moves to the next revision.
    pub fn bump(&self) -> Revision {
        Revision::new(self.0.revision.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Marks the entity as deleted from the store.
    pub fn delete(&self) {
        self.0.persistent.store(false, Ordering::SeqCst);
    }

    /// Entity id.
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

impl TransferableEntity for TestEntity {
    fn key(&self) -> EntityKey {
        EntityKey::new(self.0.kind.clone(), self.0.id.clone())
    }

    fn last_modified(&self) -> Revision {
        Revision::new(self.0.revision.load(Ordering::SeqCst))
    }

    fn slaves(&self) -> Vec<Self> {
        self.0.slaves.read().clone()
    }

    fn is_persistent(&self) -> bool {
        self.0.persistent.load(Ordering::SeqCst)
    }

    fn properties(&self) -> PropertyMap {
        let mut properties = self.0.properties.read().clone();
        properties.insert("id".into(), Value::from(self.0.id.clone()));
        properties.insert("revision".into(), Value::from(self.last_modified().value()));
        properties
    }
}

impl fmt::Debug for TestEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestEntity({}, {})", self.key(), self.last_modified())
    }
}

/// A logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSession {
    /// User name.
    pub user: String,
}

impl TestSession {
    /// Creates a session for `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl fmt::Display for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)
    }
}

/// Policy with a hide list and a redaction list that counts its calls.
#[derive(Default)]
pub struct RecordingPolicy {
    hidden: RwLock<HashSet<EntityKey>>,
    redacted: RwLock<Vec<String>>,
    visibility_checks: AtomicUsize,
    filter_calls: AtomicUsize,
}

impl RecordingPolicy {
    /// Creates a policy that shows everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hides an entity from every conversation.
    pub fn hide(&self, key: EntityKey) {
        self.hidden.write().insert(key);
    }

    /// Removes a property from every delta.
    pub fn redact(&self, property: &str) {
        self.redacted.write().push(property.to_string());
    }

    /// Number of visibility checks so far.
    pub fn visibility_checks(&self) -> usize {
        self.visibility_checks.load(Ordering::SeqCst)
    }

    /// Number of filter calls so far.
    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }
}

impl<S> VisibilityPolicy<S, TestEntity> for RecordingPolicy {
    fn is_visible(&self, entity: &TestEntity, _conversation: &ConversationView<'_, S>) -> bool {
        self.visibility_checks.fetch_add(1, Ordering::SeqCst);
        !self.hidden.read().contains(&entity.key())
    }

    fn filter_properties(
        &self,
        _entity: &TestEntity,
        _conversation: &ConversationView<'_, S>,
        properties: &mut PropertyMap,
    ) {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        for name in self.redacted.read().iter() {
            properties.remove(name);
        }
    }
}

/// Conversation type used across the test suites.
pub type TestConversation = Conversation<TestSession, TestEntity, Arc<RecordingPolicy>>;

/// Creates a conversation for user "tester" with a fresh recording policy.
pub fn test_conversation(number: u32) -> TestConversation {
    test_conversation_with(number, Arc::new(RecordingPolicy::new()))
}

/// Creates a conversation for user "tester" with the given policy.
pub fn test_conversation_with(number: u32, policy: Arc<RecordingPolicy>) -> TestConversation {
    Conversation::new(
        Arc::new(TestSession::new("tester")),
        number,
        policy,
        ConversationConfig::default(),
    )
}

/// A chain `e0 <- e1 <- ... <- e(n-1)`: each entity has the previous one as slave.
pub fn entity_chain(kind: &str, len: usize) -> Vec<TestEntity> {
    let mut chain: Vec<TestEntity> = Vec::with_capacity(len);
    for i in 0..len {
        let entity = TestEntity::new(kind, format!("{kind}-{i}"));
        if let Some(previous) = chain.last() {
            entity.add_slave(previous);
        }
        chain.push(entity);
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_state_is_shared_between_clones() {
        let a = TestEntity::new("Task", "a");
        let handle = a.clone();
        handle.bump();
        assert_eq!(a.last_modified(), Revision::new(2));

        handle.delete();
        assert!(!a.is_persistent());
    }

    #[test]
    fn set_property_bumps_revision() {
        let a = TestEntity::new("Task", "a");
        a.set_property("label", "hello");
        assert_eq!(a.last_modified(), Revision::new(2));
        assert_eq!(a.properties().get("label"), Some(&Value::from("hello")));
        assert_eq!(a.properties().get("id"), Some(&Value::from("a")));
        assert_eq!(a.properties().get("revision"), Some(&Value::from(2)));
    }

    #[test]
    fn chain_links_previous() {
        let chain = entity_chain("Task", 3);
        assert!(chain[0].slaves().is_empty());
        assert_eq!(chain[2].slaves()[0].id(), "Task-1");
    }

    #[test]
    fn recording_policy_hides_and_redacts() {
        let policy = RecordingPolicy::new();
        let a = TestEntity::new("Task", "a").with_property("secret", 1);
        policy.hide(a.key());
        policy.redact("secret");

        let session = TestSession::new("x");
        let view = ConversationView {
            number: 1,
            session: &session,
            development_mode: false,
        };
        assert!(!policy.is_visible(&a, &view));

        let mut props = a.properties();
        policy.filter_properties(&a, &view, &mut props);
        assert!(!props.contains_key("secret"));
        assert_eq!(policy.visibility_checks(), 1);
        assert_eq!(policy.filter_calls(), 1);
    }
}
