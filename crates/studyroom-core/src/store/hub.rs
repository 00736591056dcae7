use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Fan-out of committed documents to subscribers, one watch channel per
/// session id. A deleted or missing document is published as `Value::Null`.
/// A channel lives only while it has receivers; documents for an id nobody
/// watches are dropped.
///
/// Delivery can be held back: while held, the newest document per session is
/// buffered and only published on release.
#[derive(Debug, Default)]
pub(crate) struct SnapshotHub {
    channels: Mutex<HashMap<String, watch::Sender<Value>>>,
    holding: AtomicBool,
    held: Mutex<HashMap<String, Value>>,
}

impl SnapshotHub {
    pub(crate) fn subscribe(&self, session_id: &str, current: Value) -> Subscription {
        let mut channels = lock(&self.channels);
        prune(&mut channels);
        let sender = channels
            .entry(session_id.to_string())
            .or_insert_with(|| watch::channel(current).0);
        Subscription {
            session_id: session_id.to_string(),
            rx: sender.subscribe(),
        }
    }

    pub(crate) fn publish(&self, session_id: &str, doc: Value) {
        if self.holding.load(Ordering::SeqCst) {
            lock(&self.held).insert(session_id.to_string(), doc);
            return;
        }
        let mut channels = lock(&self.channels);
        prune(&mut channels);
        if let Some(sender) = channels.get(session_id) {
            sender.send_replace(doc);
        }
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        lock(&self.channels).len()
    }

    pub(crate) fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.holding.store(false, Ordering::SeqCst);
        let pending: Vec<(String, Value)> = lock(&self.held).drain().collect();
        for (session_id, doc) in pending {
            self.publish(&session_id, doc);
        }
    }
}

fn prune(channels: &mut HashMap<String, watch::Sender<Value>>) {
    channels.retain(|_, sender| sender.receiver_count() > 0);
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Live feed of one session document.
///
/// Only the newest version is kept: a subscriber that polls slowly skips
/// intermediate versions but always ends on the latest one.
#[derive(Debug)]
pub struct Subscription {
    session_id: String,
    rx: watch::Receiver<Value>,
}

impl Subscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Newest unseen document, if any.
    pub fn poll(&mut self) -> Option<Value> {
        match self.rx.has_changed() {
            Ok(true) => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// True once the store side of the feed has been dropped.
    pub fn is_closed(&self) -> bool {
        self.rx.has_changed().is_err()
    }

    pub fn unsubscribe(self) {
        tracing::debug!(session = %self.session_id, "Unsubscribed");
    }
}
