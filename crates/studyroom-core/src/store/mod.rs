//! Session store abstraction.
//!
//! A session store holds one JSON document per shared session id and pushes
//! every committed version of a document to its subscribers. Writes are
//! merge-patches: fields present in the patch replace the stored ones, the
//! rest are kept.

mod hub;
mod memory;

pub use hub::Subscription;
pub(crate) use hub::SnapshotHub;
pub use memory::MemorySessionStore;

use serde_json::Value;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::timer::{SessionState, TimerSettings};

/// Length of generated session ids.
pub const SESSION_ID_LEN: usize = 8;

pub trait SessionStore: Send + Sync {
    /// Current document, or `None` when nothing is stored under `session_id`.
    fn read(&self, session_id: &str) -> Result<Option<Value>, StoreError>;

    /// Merge `patch` into the existing document.
    ///
    /// # Errors
    /// `NotFound` when the document does not exist, `Unavailable` when the
    /// backend cannot be reached.
    fn write(&self, session_id: &str, patch: &Value) -> Result<(), StoreError>;

    /// Store a new document. Fails with `AlreadyExists` if the id is taken.
    fn create(&self, session_id: &str, document: &Value) -> Result<(), StoreError>;

    fn delete(&self, session_id: &str) -> Result<(), StoreError>;

    /// Subscribe to committed versions of `session_id`. Subscribing to an id
    /// with no document is allowed; a later `create` is delivered.
    fn subscribe(&self, session_id: &str) -> Result<Subscription, StoreError>;
}

/// Shallow JSON merge: top-level keys of `patch` overwrite `doc`.
pub(crate) fn merge_patch(doc: &mut Value, patch: &Value) -> Result<(), StoreError> {
    let (Some(target), Some(fields)) = (doc.as_object_mut(), patch.as_object()) else {
        return Err(StoreError::InvalidDocument(
            "session documents and patches must be JSON objects".to_string(),
        ));
    };
    for (key, value) in fields {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

/// Random short id for a new shared session.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(SESSION_ID_LEN)
        .collect()
}

/// Create a shared session owned by `controller_id` with the durations from
/// `settings`. Returns the new session id.
pub fn create_shared_session(
    store: &dyn SessionStore,
    settings: &TimerSettings,
    controller_id: &str,
    clock: &dyn Clock,
) -> Result<String, StoreError> {
    let session_id = new_session_id();
    let state = SessionState::new_shared(
        settings.active_secs,
        settings.rest_secs,
        controller_id,
        clock.now_ms(),
    );
    store.create(&session_id, &serde_json::to_value(&state)?)?;
    tracing::info!(session = %session_id, controller = controller_id, "Created shared session");
    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    #[test]
    fn session_ids_are_short_and_distinct() {
        let a = new_session_id();
        let b = new_session_id();
        assert_eq!(a.len(), SESSION_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut doc = json!({"phase": "active", "isRunning": false});
        merge_patch(&mut doc, &json!({"isRunning": true})).unwrap();
        assert_eq!(doc, json!({"phase": "active", "isRunning": true}));
    }

    #[test]
    fn merge_rejects_non_objects() {
        let mut doc = json!({"phase": "active"});
        assert!(merge_patch(&mut doc, &json!([1, 2])).is_err());
    }

    #[test]
    fn created_session_names_controller() {
        let store = MemorySessionStore::new();
        let clock = ManualClock::new(1_000);
        let id = create_shared_session(&store, &TimerSettings::default(), "alice", &clock).unwrap();
        let doc = store.read(&id).unwrap().unwrap();
        assert_eq!(doc["controllerId"], "alice");
        assert_eq!(doc["isRunning"], false);
        assert_eq!(doc["anchorTime"], 1_000);
        assert_eq!(doc["remainingSeconds"], 1500);
    }
}
