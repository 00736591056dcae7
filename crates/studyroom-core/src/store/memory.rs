use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{merge_patch, SessionStore, SnapshotHub, Subscription};
use crate::error::StoreError;

/// In-process session store.
///
/// Besides serving single-process sessions it can simulate a flaky backend:
/// `set_offline` makes every operation fail with `Unavailable`, and
/// `hold_deliveries` delays notifications until `release_deliveries`.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    docs: Mutex<HashMap<String, Value>>,
    hub: SnapshotHub,
    offline: AtomicBool,
    writes: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn hold_deliveries(&self) {
        self.hub.hold();
    }

    pub fn release_deliveries(&self) {
        self.hub.release();
    }

    /// Number of `write` calls received, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Publish `doc` as if another process had stored it. Used to inject
    /// out-of-order or malformed snapshots.
    pub fn inject(&self, session_id: &str, doc: Value) {
        self.docs_lock().insert(session_id.to_string(), doc.clone());
        self.hub.publish(session_id, doc);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn docs_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.docs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, session_id: &str) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        Ok(self.docs_lock().get(session_id).cloned())
    }

    fn write(&self, session_id: &str, patch: &Value) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;
        let doc = {
            let mut docs = self.docs_lock();
            let doc = docs
                .get_mut(session_id)
                .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
            merge_patch(doc, patch)?;
            doc.clone()
        };
        self.hub.publish(session_id, doc);
        Ok(())
    }

    fn create(&self, session_id: &str, document: &Value) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut docs = self.docs_lock();
            if docs.contains_key(session_id) {
                return Err(StoreError::AlreadyExists(session_id.to_string()));
            }
            docs.insert(session_id.to_string(), document.clone());
        }
        self.hub.publish(session_id, document.clone());
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        if self.docs_lock().remove(session_id).is_none() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        self.hub.publish(session_id, Value::Null);
        Ok(())
    }

    fn subscribe(&self, session_id: &str) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let current = self.docs_lock().get(session_id).cloned().unwrap_or(Value::Null);
        Ok(self.hub.subscribe(session_id, current))
    }
}
