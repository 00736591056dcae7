//! Session documents kept in the local SQLite database.
//!
//! Several processes on one machine can share a session through the same
//! database file. Writes from this process are pushed to subscribers at once;
//! writes from other processes are picked up by [`SqliteSessionStore::refresh`],
//! which compares the stored revision with the last one published.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::Database;
use crate::error::{CoreError, StoreError};
use crate::store::{merge_patch, SessionStore, SnapshotHub, Subscription};

pub struct SqliteSessionStore {
    db: Mutex<Database>,
    hub: SnapshotHub,
    published: Mutex<HashMap<String, i64>>,
}

impl SqliteSessionStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            hub: SnapshotHub::default(),
            published: Mutex::new(HashMap::new()),
        }
    }

    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_memory() -> Result<Self, CoreError> {
        Ok(Self::new(Database::open_memory()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("session database lock poisoned".to_string()))
    }

    fn load(db: &Database, session_id: &str) -> Result<Option<(Value, i64)>, StoreError> {
        let row = db
            .conn()
            .query_row(
                "SELECT body, revision FROM session_documents WHERE id = ?1",
                params![session_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        match row {
            Some((body, revision)) => Ok(Some((serde_json::from_str(&body)?, revision))),
            None => Ok(None),
        }
    }

    fn publish(&self, session_id: &str, doc: Value, revision: i64) {
        if let Ok(mut published) = self.published.lock() {
            published.insert(session_id.to_string(), revision);
        }
        self.hub.publish(session_id, doc);
    }

    /// Publish the stored document if another process changed it since the
    /// last delivery. Returns whether anything was published.
    pub fn refresh(&self, session_id: &str) -> Result<bool, StoreError> {
        let current = {
            let db = self.db()?;
            Self::load(&db, session_id)?
        };
        let last = self
            .published
            .lock()
            .ok()
            .and_then(|p| p.get(session_id).copied());
        match (current, last) {
            (Some((doc, revision)), last) if last != Some(revision) => {
                tracing::debug!(session = session_id, revision, "Picked up external session change");
                self.publish(session_id, doc, revision);
                Ok(true)
            }
            (None, Some(_)) => {
                if let Ok(mut published) = self.published.lock() {
                    published.remove(session_id);
                }
                self.hub.publish(session_id, Value::Null);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl SessionStore for SqliteSessionStore {
    fn read(&self, session_id: &str) -> Result<Option<Value>, StoreError> {
        let db = self.db()?;
        Ok(Self::load(&db, session_id)?.map(|(doc, _)| doc))
    }

    fn write(&self, session_id: &str, patch: &Value) -> Result<(), StoreError> {
        let (doc, revision) = {
            let db = self.db()?;
            let tx = db.conn().unchecked_transaction()?;
            let (mut doc, revision) = Self::load(&db, session_id)?
                .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
            merge_patch(&mut doc, patch)?;
            let revision = revision + 1;
            tx.execute(
                "UPDATE session_documents SET body = ?2, revision = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    session_id,
                    serde_json::to_string(&doc)?,
                    revision,
                    Utc::now().to_rfc3339()
                ],
            )?;
            tx.commit()?;
            (doc, revision)
        };
        self.publish(session_id, doc, revision);
        Ok(())
    }

    fn create(&self, session_id: &str, document: &Value) -> Result<(), StoreError> {
        {
            let db = self.db()?;
            let inserted = db.conn().execute(
                "INSERT OR IGNORE INTO session_documents (id, body, revision, updated_at)
                 VALUES (?1, ?2, 0, ?3)",
                params![
                    session_id,
                    serde_json::to_string(document)?,
                    Utc::now().to_rfc3339()
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::AlreadyExists(session_id.to_string()));
            }
        }
        self.publish(session_id, document.clone(), 0);
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let removed = {
            let db = self.db()?;
            db.conn().execute(
                "DELETE FROM session_documents WHERE id = ?1",
                params![session_id],
            )?
        };
        if removed == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        if let Ok(mut published) = self.published.lock() {
            published.remove(session_id);
        }
        self.hub.publish(session_id, Value::Null);
        Ok(())
    }

    fn subscribe(&self, session_id: &str) -> Result<Subscription, StoreError> {
        let current = {
            let db = self.db()?;
            Self::load(&db, session_id)?
        };
        let doc = match current {
            Some((doc, revision)) => {
                if let Ok(mut published) = self.published.lock() {
                    published.entry(session_id.to_string()).or_insert(revision);
                }
                doc
            }
            None => Value::Null,
        };
        Ok(self.hub.subscribe(session_id, doc))
    }
}
