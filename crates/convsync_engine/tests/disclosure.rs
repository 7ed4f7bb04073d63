//! Disclosure behavior against the shared test fixtures.

use convsync_engine::{SyncError, TransferableEntity};
use convsync_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn ids(batch: &convsync_engine::TransferBatch) -> Vec<String> {
    batch.entity_keys().map(|k| k.id().to_string()).collect()
}

#[test]
fn scenario_entity_with_one_slave() {
    let conversation = test_conversation(1);
    let b = TestEntity::new("Task", "B");
    let a = TestEntity::new("Story", "A").with_slave(&b);

    conversation.disclose(&a).unwrap();
    let first = conversation.drain().unwrap();
    assert_eq!(ids(&first), vec!["B", "A"]);
    assert!(conversation.is_available_on_client(&a));
    assert!(conversation.is_available_on_client(&b));
    assert_eq!(conversation.remote_revision(&a), Some(a.last_modified()));
    assert_eq!(conversation.remote_revision(&b), Some(b.last_modified()));

    conversation.disclose(&a).unwrap();
    assert!(conversation.drain().unwrap().is_empty());
}

#[test]
fn idempotent_disclosure_queues_one_delta() {
    let conversation = test_conversation(1);
    let a = TestEntity::new("Task", "a");

    conversation.disclose(&a).unwrap();
    conversation.disclose(&a).unwrap();
    assert_eq!(conversation.pending_len(), 1);
}

#[test]
fn changed_revision_is_resent_and_tracked() {
    let conversation = test_conversation(1);
    let a = TestEntity::new("Task", "a");
    conversation.disclose(&a).unwrap();
    let r1 = a.last_modified();
    assert_eq!(conversation.remote_revision(&a), Some(r1));

    a.set_property("label", "renamed");
    let r2 = a.last_modified();
    assert_ne!(r1, r2);

    conversation.disclose(&a).unwrap();
    let batch = conversation.drain().unwrap();
    assert_eq!(ids(&batch), vec!["a", "a"]);
    assert_eq!(batch.entities[1].property("label"), Some(&json!("renamed")));
    assert_eq!(conversation.remote_revision(&a), Some(r2));
}

#[test]
fn unchanged_slave_is_not_resent_with_changed_master() {
    let conversation = test_conversation(1);
    let b = TestEntity::new("Task", "b");
    let a = TestEntity::new("Story", "a").with_slave(&b);
    conversation.disclose(&a).unwrap();
    conversation.drain();

    a.bump();
    conversation.disclose(&a).unwrap();
    assert_eq!(ids(&conversation.drain().unwrap()), vec!["a"]);
}

#[test]
fn chain_is_sent_bottom_up() {
    let conversation = test_conversation(1);
    let chain = entity_chain("Task", 5);

    conversation.disclose(chain.last().unwrap()).unwrap();
    let batch = conversation.drain().unwrap();
    assert_eq!(
        ids(&batch),
        vec!["Task-0", "Task-1", "Task-2", "Task-3", "Task-4"]
    );
}

#[test]
fn shared_slave_is_sent_once() {
    let conversation = test_conversation(1);
    let shared = TestEntity::new("User", "u");
    let left = TestEntity::new("Task", "l").with_slave(&shared);
    let right = TestEntity::new("Task", "r").with_slave(&shared);
    let root = TestEntity::new("Story", "s")
        .with_slave(&left)
        .with_slave(&right);

    conversation.disclose(&root).unwrap();
    let batch = conversation.drain().unwrap();
    assert_eq!(ids(&batch), vec!["u", "l", "r", "s"]);
}

#[test]
fn tombstone_skips_policy() {
    let policy = Arc::new(RecordingPolicy::new());
    let conversation = test_conversation_with(1, Arc::clone(&policy));
    let a = TestEntity::new("Task", "a");
    policy.hide(a.key());
    a.delete();

    conversation.disclose(&a).unwrap();
    let batch = conversation.drain().unwrap();
    assert!(batch.entities.is_empty());
    assert!(batch.is_deleted(&a.key()));
    assert_eq!(policy.visibility_checks(), 0);
    assert_eq!(policy.filter_calls(), 0);
}

#[test]
fn deleting_known_entity_forgets_it() {
    let conversation = test_conversation(1);
    let a = TestEntity::new("Task", "a");
    conversation.disclose(&a).unwrap();
    assert!(conversation.is_available_on_client(&a));

    a.delete();
    conversation.disclose(&a).unwrap();
    assert!(!conversation.is_available_on_client(&a));

    let batch = conversation.drain().unwrap();
    assert!(batch.contains_entity(&a.key()));
    assert!(batch.is_deleted(&a.key()));
}

#[test]
fn hidden_slave_denies_master() {
    let policy = Arc::new(RecordingPolicy::new());
    let conversation = test_conversation_with(4, Arc::clone(&policy));
    let secret = TestEntity::new("Secret", "s");
    let open = TestEntity::new("Task", "o");
    let master = TestEntity::new("Story", "m")
        .with_slave(&open)
        .with_slave(&secret);
    policy.hide(secret.key());

    let err = conversation.disclose(&master).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(
        err,
        SyncError::PermissionDenied {
            entity: secret.key(),
            conversation: 4
        }
    );

    // Work done before the failure stays queued; the master never is.
    let batch = conversation.drain().unwrap();
    assert_eq!(ids(&batch), vec!["o"]);
    assert!(!conversation.is_available_on_client(&master));
}

#[test]
fn redaction_applies_to_every_delta() {
    let policy = Arc::new(RecordingPolicy::new());
    policy.redact("password");
    let conversation = test_conversation_with(1, policy);

    let user = TestEntity::new("User", "u")
        .with_property("name", "ada")
        .with_property("password", "hunter2");
    conversation.disclose(&user).unwrap();

    let batch = conversation.drain().unwrap();
    assert_eq!(batch.entities[0].property("name"), Some(&json!("ada")));
    assert!(batch.entities[0].property("password").is_none());
}

#[test]
fn disclose_all_stops_at_first_error() {
    let policy = Arc::new(RecordingPolicy::new());
    let conversation = test_conversation_with(1, Arc::clone(&policy));
    let a = TestEntity::new("Task", "a");
    let hidden = TestEntity::new("Task", "h");
    let c = TestEntity::new("Task", "c");
    policy.hide(hidden.key());

    assert!(conversation.disclose_all([&a, &hidden, &c]).is_err());
    assert_eq!(ids(&conversation.drain().unwrap()), vec!["a"]);
}

#[test]
fn clear_by_type_is_exact() {
    let conversation = test_conversation(1);
    let task = TestEntity::new("Task", "1");
    let list = TestEntity::new("TaskList", "1");
    conversation.disclose_all([&task, &list]).unwrap();

    assert_eq!(conversation.clear_remote_entities_by_type("Task"), 1);
    assert!(!conversation.is_available_on_client(&task));
    assert!(conversation.is_available_on_client(&list));
}

#[test]
fn batches_carry_session_metadata() {
    let conversation = test_conversation(9);
    let first = conversation.drain().unwrap();
    conversation.disclose(&TestEntity::new("Task", "a")).unwrap();
    let second = conversation.drain().unwrap();

    assert_eq!(second.metadata.conversation_number, 9);
    assert_eq!(first.metadata.entity_id_base, second.metadata.entity_id_base);
    assert!(!second.metadata.development_mode);
}
