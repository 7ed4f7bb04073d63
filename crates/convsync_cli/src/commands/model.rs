//! In-memory entity model the commands run against.

use convsync_engine::{EntityKey, PropertyMap, Revision, TransferableEntity};
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A record held in memory; clones share state.
#[derive(Clone)]
pub struct Record(Arc<RecordState>);

struct RecordState {
    kind: String,
    id: String,
    revision: AtomicU64,
    slaves: RwLock<Vec<Record>>,
    fields: RwLock<PropertyMap>,
}

impl Record {
    /// Creates a record at revision 1.
    pub fn new(kind: &str, id: impl Into<String>) -> Self {
        Self(Arc::new(RecordState {
            kind: kind.to_string(),
            id: id.into(),
            revision: AtomicU64::new(1),
            slaves: RwLock::new(Vec::new()),
            fields: RwLock::new(PropertyMap::new()),
        }))
    }

    /// Sets a field without changing the revision.
    pub fn with_field(self, name: &str, value: impl Into<Value>) -> Self {
        self.0.fields.write().insert(name.to_string(), value.into());
        self
    }

    /// Adds a record this one references.
    pub fn link(&self, slave: &Record) {
        self.0.slaves.write().push(slave.clone());
    }

    /// Moves to the next revision.
    pub fn touch(&self) {
        self.0.revision.fetch_add(1, Ordering::SeqCst);
    }
}

impl TransferableEntity for Record {
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
        true
    }

    fn properties(&self) -> PropertyMap {
        let mut properties = self.0.fields.read().clone();
        properties.insert("id".into(), Value::from(self.0.id.clone()));
        properties
    }
}

/// The operator running the command.
#[derive(Debug, Clone)]
pub struct Operator(pub String);

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
