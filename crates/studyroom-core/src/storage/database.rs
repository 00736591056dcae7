//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - Weekly study progress per user
//! - Key-value store for application state (the local timer lives here)
//! - Shared session documents (see [`super::SqliteSessionStore`])

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, Result};
use crate::progress::{DayProgress, ProgressRecorder, WeekProgress, WeekSlot};

/// Database file name inside the data directory.
pub const DB_FILE: &str = "studyroom.db";

/// SQLite database for local state and study progress.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/studyroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(data_dir()?.join(DB_FILE))
    }

    /// Open (or create) the database at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    /// The stored week, if any minutes were recorded for it.
    pub fn week_progress(&self, user_id: &str, year: i32, week: u32) -> Result<Option<WeekProgress>> {
        let days = self
            .conn
            .query_row(
                "SELECT days FROM study_weeks WHERE user_id = ?1 AND year = ?2 AND week_number = ?3",
                params![user_id, year, week],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        days.map(|raw| decode_week(year, week, &raw)).transpose()
    }

    /// All stored weeks of a user, newest first.
    pub fn weeks_for_user(&self, user_id: &str) -> Result<Vec<WeekProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT year, week_number, days FROM study_weeks
             WHERE user_id = ?1
             ORDER BY year DESC, week_number DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut weeks = Vec::new();
        for row in rows {
            let (year, week, raw) = row?;
            weeks.push(decode_week(year, week, &raw)?);
        }
        Ok(weeks)
    }

    pub fn delete_week(&self, user_id: &str, year: i32, week: u32) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM study_weeks WHERE user_id = ?1 AND year = ?2 AND week_number = ?3",
            params![user_id, year, week],
        )?;
        Ok(n > 0)
    }

    /// Accumulate minutes into a day. Weeks left with no minutes are removed.
    pub fn add_study_minutes(&self, user_id: &str, slot: WeekSlot, minutes: u32) -> Result<WeekProgress> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = tx
            .query_row(
                "SELECT days FROM study_weeks WHERE user_id = ?1 AND year = ?2 AND week_number = ?3",
                params![user_id, slot.year, slot.week],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let mut week = match existing {
            Some(raw) => decode_week(slot.year, slot.week, &raw)?,
            None => WeekProgress::empty(slot.year, slot.week),
        };
        week.add(slot.day_index, minutes);

        if week.is_empty() {
            tx.execute(
                "DELETE FROM study_weeks WHERE user_id = ?1 AND year = ?2 AND week_number = ?3",
                params![user_id, slot.year, slot.week],
            )?;
        } else {
            tx.execute(
                "INSERT OR REPLACE INTO study_weeks (user_id, year, week_number, days, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id,
                    slot.year,
                    slot.week,
                    serde_json::to_string(&week.days)?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        Ok(week)
    }
}

fn decode_week(year: i32, week: u32, raw: &str) -> Result<WeekProgress> {
    let days: Vec<DayProgress> = serde_json::from_str(raw).map_err(|e| {
        CoreError::Database(DatabaseError::QueryFailed(format!(
            "corrupt study week {year}-W{week}: {e}"
        )))
    })?;
    Ok(WeekProgress {
        year,
        week_number: week,
        days,
    })
}

impl ProgressRecorder for Database {
    fn record(&self, user_id: &str, slot: WeekSlot, minutes: u32) -> Result<()> {
        self.add_study_minutes(user_id, slot, minutes)?;
        Ok(())
    }
}
