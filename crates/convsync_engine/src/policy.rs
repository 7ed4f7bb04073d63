//! Visibility and property filtering.

use convsync_protocol::PropertyMap;
use std::sync::Arc;

/// Read-only view of a conversation, handed to policies.
#[derive(Debug)]
pub struct ConversationView<'a, S> {
    /// Conversation number.
    pub number: u32,
    /// Owning session.
    pub session: &'a S,
    /// Whether the session runs in development mode.
    pub development_mode: bool,
}

/// Decides what a conversation may see of an entity.
///
/// Both methods default to "everything visible, nothing redacted".
pub trait VisibilityPolicy<S, E>: Send + Sync {
    /// Returns true if `entity` may be disclosed to the conversation.
    fn is_visible(&self, _entity: &E, _conversation: &ConversationView<'_, S>) -> bool {
        true
    }

    /// Redacts properties of `entity` before they are queued.
    fn filter_properties(
        &self,
        _entity: &E,
        _conversation: &ConversationView<'_, S>,
        _properties: &mut PropertyMap,
    ) {
    }
}

/// Policy that discloses everything unfiltered.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl<S, E> VisibilityPolicy<S, E> for AllowAll {}

impl<S, E, P> VisibilityPolicy<S, E> for Arc<P>
where
    P: VisibilityPolicy<S, E> + ?Sized,
{
    fn is_visible(&self, entity: &E, conversation: &ConversationView<'_, S>) -> bool {
        (**self).is_visible(entity, conversation)
    }

    fn filter_properties(
        &self,
        entity: &E,
        conversation: &ConversationView<'_, S>,
        properties: &mut PropertyMap,
    ) {
        (**self).filter_properties(entity, conversation, properties)
    }
}

/// Policy built from a visibility predicate and a property filter.
///
/// ```
/// use convsync_engine::{ConversationView, FnPolicy, PropertyMap};
///
/// struct User { admin: bool }
///
/// let policy = FnPolicy::new(
///     |_entity: &String, view: &ConversationView<'_, User>| view.session.admin,
///     |_entity: &String, _view: &ConversationView<'_, User>, props: &mut PropertyMap| {
///         props.remove("password");
///     },
/// );
/// # let _ = policy;
/// ```
#[derive(Clone)]
pub struct FnPolicy<V, F> {
    visible: V,
    filter: F,
}

impl<V, F> FnPolicy<V, F> {
    /// Creates a policy from a predicate and a filter.
    pub fn new(visible: V, filter: F) -> Self {
        Self { visible, filter }
    }
}

impl<S, E, V, F> VisibilityPolicy<S, E> for FnPolicy<V, F>
where
    V: Fn(&E, &ConversationView<'_, S>) -> bool + Send + Sync,
    F: Fn(&E, &ConversationView<'_, S>, &mut PropertyMap) + Send + Sync,
{
    fn is_visible(&self, entity: &E, conversation: &ConversationView<'_, S>) -> bool {
        (self.visible)(entity, conversation)
    }

    fn filter_properties(
        &self,
        entity: &E,
        conversation: &ConversationView<'_, S>,
        properties: &mut PropertyMap,
    ) {
        (self.filter)(entity, conversation, properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Session {
        admin: bool,
    }

    fn view(session: &Session) -> ConversationView<'_, Session> {
        ConversationView {
            number: 1,
            session,
            development_mode: false,
        }
    }

    #[test]
    fn allow_all_is_transparent() {
        let session = Session { admin: false };
        let mut props = PropertyMap::new();
        props.insert("secret".into(), json!(1));

        let policy = AllowAll;
        assert!(VisibilityPolicy::<Session, u32>::is_visible(&policy, &7, &view(&session)));
        VisibilityPolicy::<Session, u32>::filter_properties(&policy, &7, &view(&session), &mut props);
        assert!(props.contains_key("secret"));
    }

    #[test]
    fn fn_policy_uses_session() {
        let policy = FnPolicy::new(
            |_entity: &u32, view: &ConversationView<'_, Session>| view.session.admin,
            |_entity: &u32, _view: &ConversationView<'_, Session>, props: &mut PropertyMap| {
                props.remove("secret");
            },
        );

        let admin = Session { admin: true };
        let guest = Session { admin: false };
        assert!(policy.is_visible(&1, &view(&admin)));
        assert!(!policy.is_visible(&1, &view(&guest)));

        let mut props = PropertyMap::new();
        props.insert("secret".into(), json!("x"));
        props.insert("label".into(), json!("y"));
        policy.filter_properties(&1, &view(&admin), &mut props);
        assert!(!props.contains_key("secret"));
        assert!(props.contains_key("label"));
    }

    #[test]
    fn shared_policy_delegates() {
        let policy = Arc::new(FnPolicy::new(
            |entity: &u32, _view: &ConversationView<'_, Session>| *entity > 10,
            |_entity: &u32, _view: &ConversationView<'_, Session>, _props: &mut PropertyMap| {},
        ));
        let session = Session { admin: false };
        assert!(policy.is_visible(&11, &view(&session)));
        assert!(!policy.is_visible(&3, &view(&session)));
    }
}
