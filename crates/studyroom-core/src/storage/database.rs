//! SQLite storage for timer history, tutor chat and application state.
//!
//! Provides persistent storage for:
//! - Completed timer steps and statistics (daily and all-time)
//! - Tutor conversation history
//! - Key-value store for application state (timer engine, alert markers)

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{database_path, migrations};
use crate::error::DatabaseError;
use crate::timer::Phase;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PomodoroRecord {
    pub id: i64,
    pub phase: Phase,
    pub label: String,
    pub duration_min: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_steps: u64,
    pub completed_study: u64,
    pub study_min: u64,
    pub break_min: u64,
    pub today_study: u64,
    pub today_study_min: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    /// Role name as the Gemini API spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "model" => ChatRole::Model,
            _ => ChatRole::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_phase(s: &str) -> Phase {
    match s {
        "break" => Phase::Break,
        _ => Phase::Study,
    }
}

/// Start of the current local day, as UTC.
fn local_midnight() -> DateTime<Utc> {
    Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

/// SQLite database for timer history and application state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/studyroom/studyroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let path = database_path().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Record a completed timer step.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_pomodoro(
        &self,
        phase: Phase,
        label: &str,
        duration_min: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO pomodoros (phase, label, duration_min, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                phase.as_str(),
                label,
                duration_min,
                started_at.to_rfc3339(),
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent completed steps, newest first.
    pub fn recent_pomodoros(&self, limit: u32) -> Result<Vec<PomodoroRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, phase, label, duration_min, started_at, completed_at
             FROM pomodoros
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(PomodoroRecord {
                id: row.get(0)?,
                phase: parse_phase(&row.get::<_, String>(1)?),
                label: row.get(2)?,
                duration_min: row.get(3)?,
                started_at: parse_datetime(&row.get::<_, String>(4)?),
                completed_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Totals since local midnight.
    pub fn stats_today(&self) -> Result<Stats, DatabaseError> {
        let mut stats = self.totals(Some(local_midnight()))?;
        stats.today_study = stats.completed_study;
        stats.today_study_min = stats.study_min;
        Ok(stats)
    }

    /// All-time totals, with today's study figures alongside.
    pub fn stats_all(&self) -> Result<Stats, DatabaseError> {
        let mut stats = self.totals(None)?;
        let today = self.totals(Some(local_midnight()))?;
        stats.today_study = today.completed_study;
        stats.today_study_min = today.study_min;
        Ok(stats)
    }

    fn totals(&self, since: Option<DateTime<Utc>>) -> Result<Stats, DatabaseError> {
        let since = since.map(|dt| dt.to_rfc3339()).unwrap_or_default();
        let mut stmt = self.conn.prepare(
            "SELECT phase, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM pomodoros
             WHERE completed_at >= ?1
             GROUP BY phase",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (phase, count, minutes) = row?;
            stats.total_steps += count;
            match parse_phase(&phase) {
                Phase::Study => {
                    stats.completed_study += count;
                    stats.study_min += minutes;
                }
                Phase::Break => stats.break_min += minutes,
            }
        }
        Ok(stats)
    }

    pub fn append_chat_message(&self, role: ChatRole, content: &str) -> Result<ChatMessage, DatabaseError> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO chat_messages (role, content, created_at) VALUES (?1, ?2, ?3)",
            params![role.as_str(), content, created_at.to_rfc3339()],
        )?;
        Ok(ChatMessage {
            id: self.conn.last_insert_rowid(),
            role,
            content: content.to_string(),
            created_at,
        })
    }

    /// The last `limit` chat messages in chronological order.
    pub fn recent_chat_messages(&self, limit: u32) -> Result<Vec<ChatMessage>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, role, content, created_at FROM (
                SELECT id, role, content, created_at FROM chat_messages
                ORDER BY id DESC LIMIT ?1
             ) ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(ChatMessage {
                id: row.get(0)?,
                role: ChatRole::parse(&row.get::<_, String>(1)?),
                content: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent message from `role`, if any.
    pub fn last_chat_message(&self, role: ChatRole) -> Result<Option<ChatMessage>, DatabaseError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, role, content, created_at FROM chat_messages
                 WHERE role = ?1 ORDER BY id DESC LIMIT 1",
                params![role.as_str()],
                |row| {
                    Ok(ChatMessage {
                        id: row.get(0)?,
                        role: ChatRole::parse(&row.get::<_, String>(1)?),
                        content: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?)
    }

    /// Delete the whole conversation. Returns the number of removed messages.
    pub fn clear_chat(&self) -> Result<usize, DatabaseError> {
        Ok(self.conn.execute("DELETE FROM chat_messages", [])?)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_pomodoro(Phase::Study, "Study 1", 25, now - Duration::minutes(25), now)
            .unwrap();
        db.record_pomodoro(Phase::Break, "Short Break", 5, now, now).unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_steps, 2);
        assert_eq!(stats.completed_study, 1);
        assert_eq!(stats.study_min, 25);
        assert_eq!(stats.break_min, 5);
        assert_eq!(stats.today_study, 1);

        let recent = db.recent_pomodoros(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].phase, Phase::Break);
    }

    #[test]
    fn stats_today_ignores_older_steps() {
        let db = Database::open_memory().unwrap();
        let old = Utc::now() - Duration::days(3);
        db.record_pomodoro(Phase::Study, "Study 1", 25, old, old).unwrap();

        let today = db.stats_today().unwrap();
        assert_eq!(today, Stats::default());
        assert_eq!(db.stats_all().unwrap().completed_study, 1);
    }

    #[test]
    fn chat_history_is_chronological_and_limited() {
        let db = Database::open_memory().unwrap();
        for i in 0..5 {
            let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Model };
            db.append_chat_message(role, &format!("message {i}")).unwrap();
        }

        let last = db.recent_chat_messages(3).unwrap();
        let contents: Vec<_> = last.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["message 2", "message 3", "message 4"]);
        assert_eq!(last[1].role, ChatRole::Model);

        assert_eq!(db.clear_chat().unwrap(), 5);
        assert!(db.recent_chat_messages(3).unwrap().is_empty());
    }

    #[test]
    fn last_chat_message_by_role() {
        let db = Database::open_memory().unwrap();
        assert!(db.last_chat_message(ChatRole::Model).unwrap().is_none());

        db.append_chat_message(ChatRole::User, "q1").unwrap();
        db.append_chat_message(ChatRole::Model, "a1").unwrap();
        db.append_chat_message(ChatRole::User, "q2").unwrap();
        db.append_chat_message(ChatRole::Model, "a2").unwrap();
        db.append_chat_message(ChatRole::User, "thanks").unwrap();

        let reply = db.last_chat_message(ChatRole::Model).unwrap().unwrap();
        assert_eq!(reply.content, "a2");
        assert_eq!(reply.role, ChatRole::Model);
        assert_eq!(db.last_chat_message(ChatRole::User).unwrap().unwrap().content, "thanks");
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
