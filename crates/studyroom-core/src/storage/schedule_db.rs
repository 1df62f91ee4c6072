//! SQLite-based storage for study schedules and their sessions.

use std::path::Path;

use chrono::{DateTime, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension};

use super::{database_path, migrations};
use crate::error::{CoreError, DatabaseError};
use crate::schedule::{ClockTime, Schedule, Session, SessionPatch};

const ACTIVE_KEY: &str = "active_schedule";

// === Helper Functions ===

fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Days from Monday, as stored in `sessions.day`.
fn weekday_from_index(index: i64) -> Weekday {
    match index {
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        _ => Weekday::Mon,
    }
}

fn parse_clock(column: usize, value: String) -> Result<ClockTime, rusqlite::Error> {
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_session(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        subject: row.get(1)?,
        day: weekday_from_index(row.get(2)?),
        start: parse_clock(3, row.get(3)?)?,
        end: parse_clock(4, row.get(4)?)?,
        notes: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn name_taken(name: &str) -> DatabaseError {
    DatabaseError::AlreadyExists {
        kind: "schedule",
        key: name.to_string(),
    }
}

fn not_found(key: &str) -> DatabaseError {
    DatabaseError::NotFound {
        kind: "schedule",
        key: key.to_string(),
    }
}

/// SQLite storage for schedules.
///
/// Schedule names are unique regardless of case. One schedule can be marked
/// active; the alert watcher follows that one.
pub struct ScheduleDb {
    conn: Connection,
}

impl ScheduleDb {
    /// Open the schedule database at `~/.config/studyroom/studyroom.db`.
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

    /// Create an empty schedule.
    ///
    /// # Errors
    /// Returns `AlreadyExists` if another schedule has the same name (ignoring case).
    pub fn create_schedule(&self, name: &str) -> Result<Schedule, CoreError> {
        let schedule = Schedule::new(name)?;
        self.conn
            .execute(
                "INSERT INTO schedules (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    schedule.id,
                    schedule.name,
                    schedule.created_at.to_rfc3339(),
                    schedule.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    name_taken(&schedule.name)
                } else {
                    DatabaseError::from(e)
                }
            })?;
        tracing::debug!(id = %schedule.id, name = %schedule.name, "created schedule");
        Ok(schedule)
    }

    /// Write a schedule and replace its sessions, creating the row if needed.
    pub fn save_schedule(&self, schedule: &Schedule) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let unique = |e: rusqlite::Error| {
            if is_unique_violation(&e) {
                name_taken(&schedule.name)
            } else {
                DatabaseError::from(e)
            }
        };
        let updated = tx
            .execute(
                "UPDATE schedules SET name = ?2, updated_at = ?3 WHERE id = ?1",
                params![schedule.id, schedule.name, schedule.updated_at.to_rfc3339()],
            )
            .map_err(unique)?;
        if updated == 0 {
            tx.execute(
                "INSERT INTO schedules (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    schedule.id,
                    schedule.name,
                    schedule.created_at.to_rfc3339(),
                    schedule.updated_at.to_rfc3339(),
                ],
            )
            .map_err(unique)?;
        }

        tx.execute(
            "DELETE FROM sessions WHERE schedule_id = ?1",
            params![schedule.id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sessions (id, schedule_id, subject, day, start_time, end_time, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for s in &schedule.sessions {
                stmt.execute(params![
                    s.id,
                    schedule.id,
                    s.subject,
                    s.day.num_days_from_monday(),
                    s.start.to_string(),
                    s.end.to_string(),
                    s.notes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a schedule with its sessions by ID.
    pub fn get_schedule(&self, id: &str) -> Result<Option<Schedule>, DatabaseError> {
        let header = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM schedules WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, name, created_at, updated_at)) = header else {
            return Ok(None);
        };
        let sessions = self.load_sessions(&id)?;
        Ok(Some(Schedule {
            id,
            name,
            sessions,
            created_at: parse_datetime_fallback(&created_at),
            updated_at: parse_datetime_fallback(&updated_at),
        }))
    }

    /// Look up a schedule by exact ID, then by name (ignoring case).
    ///
    /// # Errors
    /// Returns `NotFound` if neither matches.
    pub fn find_schedule(&self, id_or_name: &str) -> Result<Schedule, DatabaseError> {
        if let Some(schedule) = self.get_schedule(id_or_name)? {
            return Ok(schedule);
        }
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM schedules WHERE name = ?1",
                params![id_or_name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_schedule(&id)?.ok_or_else(|| not_found(id_or_name)),
            None => Err(not_found(id_or_name)),
        }
    }

    /// List all schedules ordered by name.
    pub fn list_schedules(&self) -> Result<Vec<Schedule>, DatabaseError> {
        let ids = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM schedules ORDER BY name COLLATE NOCASE")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut schedules = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(schedule) = self.get_schedule(&id)? {
                schedules.push(schedule);
            }
        }
        Ok(schedules)
    }

    fn load_sessions(&self, schedule_id: &str) -> Result<Vec<Session>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, day, start_time, end_time, notes
             FROM sessions
             WHERE schedule_id = ?1
             ORDER BY day, start_time, subject",
        )?;
        let rows = stmt.query_map(params![schedule_id], row_to_session)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn rename_schedule(&self, id_or_name: &str, new_name: &str) -> Result<Schedule, CoreError> {
        let mut schedule = self.find_schedule(id_or_name)?;
        schedule.rename(new_name)?;
        self.save_schedule(&schedule)?;
        Ok(schedule)
    }

    /// Delete a schedule and its sessions. Clears the active pointer if it
    /// referred to this schedule.
    pub fn delete_schedule(&self, id_or_name: &str) -> Result<Schedule, DatabaseError> {
        let schedule = self.find_schedule(id_or_name)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM schedules WHERE id = ?1", params![schedule.id])?;
        tx.execute(
            "DELETE FROM kv WHERE key = ?1 AND value = ?2",
            params![ACTIVE_KEY, schedule.id],
        )?;
        tx.commit()?;
        tracing::debug!(id = %schedule.id, "deleted schedule");
        Ok(schedule)
    }

    /// Mark a schedule as the one the watcher follows.
    pub fn set_active(&self, id_or_name: &str) -> Result<Schedule, DatabaseError> {
        let schedule = self.find_schedule(id_or_name)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![ACTIVE_KEY, schedule.id],
        )?;
        Ok(schedule)
    }

    /// The active schedule. A dangling pointer reads as none.
    pub fn active_schedule(&self) -> Result<Option<Schedule>, DatabaseError> {
        let id: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![ACTIVE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_schedule(&id),
            None => Ok(None),
        }
    }

    /// Add a session to a schedule.
    pub fn add_session(&self, id_or_name: &str, session: Session) -> Result<Schedule, CoreError> {
        let mut schedule = self.find_schedule(id_or_name)?;
        schedule.add_session(session)?;
        self.save_schedule(&schedule)?;
        Ok(schedule)
    }

    /// Patch a session found by id or unique id prefix.
    pub fn update_session(
        &self,
        id_or_name: &str,
        session: &str,
        patch: SessionPatch,
    ) -> Result<Session, CoreError> {
        let mut schedule = self.find_schedule(id_or_name)?;
        let id = schedule
            .find_session(session)
            .map(|s| s.id.clone())
            .ok_or_else(|| DatabaseError::NotFound {
                kind: "session",
                key: session.to_string(),
            })?;
        let updated = schedule.update_session(&id, patch)?.clone();
        self.save_schedule(&schedule)?;
        Ok(updated)
    }

    /// Remove a session by id or unique id prefix.
    pub fn remove_session(&self, id_or_name: &str, session: &str) -> Result<Session, CoreError> {
        let mut schedule = self.find_schedule(id_or_name)?;
        let id = schedule
            .find_session(session)
            .map(|s| s.id.clone())
            .ok_or_else(|| DatabaseError::NotFound {
                kind: "session",
                key: session.to_string(),
            })?;
        let removed = schedule.remove_session(&id)?;
        self.save_schedule(&schedule)?;
        Ok(removed)
    }
}
