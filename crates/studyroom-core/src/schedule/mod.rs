//! Weekly study schedules.
//!
//! A [`Schedule`] is a named collection of [`Session`]s. Each session is one
//! study block on a single weekday, bounded by `HH:mm` start and end times
//! that never cross midnight. Sessions are kept ordered Monday-first, then by
//! start time and subject.

mod clock;

pub use clock::{parse_weekday, week_minute, ClockTime, MINUTES_PER_DAY, MINUTES_PER_WEEK};

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// One study block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub subject: String,
    pub day: Weekday,
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a session. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub subject: Option<String>,
    pub day: Option<Weekday>,
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
    pub notes: Option<Option<String>>,
}

impl Session {
    pub fn new(
        subject: &str,
        day: Weekday,
        start: ClockTime,
        end: ClockTime,
    ) -> Result<Self, ValidationError> {
        let session = Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.trim().to_string(),
            day,
            start,
            end,
            notes: None,
        };
        session.validate()?;
        Ok(session)
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = if notes.trim().is_empty() { None } else { Some(notes) };
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "subject".into(),
                message: "must not be empty".into(),
            });
        }
        if self.end <= self.start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start.to_string(),
                end: self.end.to_string(),
            });
        }
        Ok(())
    }

    pub fn duration_min(&self) -> u16 {
        self.end.minutes_since_midnight() - self.start.minutes_since_midnight()
    }

    /// `start <= time < end` on the session's day.
    pub fn is_active_at(&self, day: Weekday, time: ClockTime) -> bool {
        self.day == day && self.start <= time && time < self.end
    }

    fn sort_key(&self) -> (u32, ClockTime, &str) {
        (self.day.num_days_from_monday(), self.start, self.subject.as_str())
    }

    fn apply(&mut self, patch: SessionPatch) -> Result<(), ValidationError> {
        let mut updated = self.clone();
        if let Some(subject) = patch.subject {
            updated.subject = subject.trim().to_string();
        }
        if let Some(day) = patch.day {
            updated.day = day;
        }
        if let Some(start) = patch.start {
            updated.start = start;
        }
        if let Some(end) = patch.end {
            updated.end = end;
        }
        if let Some(notes) = patch.notes {
            updated.notes = notes;
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

/// A named weekly schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub sessions: Vec<Session>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = validate_name(name)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            sessions: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        self.name = validate_name(name)?;
        self.touch();
        Ok(())
    }

    pub fn add_session(&mut self, session: Session) -> Result<(), ValidationError> {
        session.validate()?;
        self.sessions.push(session);
        self.sort();
        self.touch();
        Ok(())
    }

    pub fn update_session(&mut self, id: &str, patch: SessionPatch) -> Result<&Session, ValidationError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| unknown_session(id))?;
        session.apply(patch)?;
        self.sort();
        self.touch();
        self.session(id).ok_or_else(|| unknown_session(id))
    }

    pub fn remove_session(&mut self, id: &str) -> Result<Session, ValidationError> {
        let idx = self
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| unknown_session(id))?;
        self.touch();
        Ok(self.sessions.remove(idx))
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Find a session by full id or a unique id prefix.
    pub fn find_session(&self, id_or_prefix: &str) -> Option<&Session> {
        if let Some(s) = self.session(id_or_prefix) {
            return Some(s);
        }
        let mut matches = self.sessions.iter().filter(|s| s.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(s), None) if !id_or_prefix.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn sessions_on(&self, day: Weekday) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(move |s| s.day == day)
    }

    pub fn active_at(&self, day: Weekday, time: ClockTime) -> Vec<&Session> {
        self.sessions
            .iter()
            .filter(|s| s.is_active_at(day, time))
            .collect()
    }

    /// Next session start strictly after (day, time), wrapping around the
    /// end of the week. Returns the session and the minutes until it starts.
    pub fn next_after(&self, day: Weekday, time: ClockTime) -> Option<(&Session, u32)> {
        let now = week_minute(day, time);
        self.sessions
            .iter()
            .map(|s| {
                let start = week_minute(s.day, s.start);
                let delta = (start + MINUTES_PER_WEEK - now) % MINUTES_PER_WEEK;
                (s, if delta == 0 { MINUTES_PER_WEEK } else { delta })
            })
            .min_by_key(|(_, delta)| *delta)
    }

    pub fn weekly_minutes(&self) -> u32 {
        self.sessions.iter().map(|s| u32::from(s.duration_min())).sum()
    }

    fn sort(&mut self) {
        self.sessions.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn unknown_session(id: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: "session".into(),
        message: format!("no session with id {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn sample() -> Schedule {
        let mut schedule = Schedule::new("Finals").unwrap();
        schedule
            .add_session(Session::new("Physics", Weekday::Wed, t("14:00"), t("15:30")).unwrap())
            .unwrap();
        schedule
            .add_session(Session::new("Math", Weekday::Mon, t("09:00"), t("10:00")).unwrap())
            .unwrap();
        schedule
            .add_session(Session::new("Biology", Weekday::Mon, t("08:00"), t("08:45")).unwrap())
            .unwrap();
        schedule
    }

    #[test]
    fn session_rejects_empty_subject_and_inverted_range() {
        assert!(Session::new("  ", Weekday::Mon, t("09:00"), t("10:00")).is_err());
        assert_eq!(
            Session::new("Math", Weekday::Mon, t("10:00"), t("10:00")).unwrap_err(),
            ValidationError::InvalidTimeRange {
                start: "10:00".into(),
                end: "10:00".into()
            }
        );
    }

    #[test]
    fn sessions_are_ordered_monday_first() {
        let schedule = sample();
        let subjects: Vec<_> = schedule.sessions.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Biology", "Math", "Physics"]);
    }

    #[test]
    fn active_at_is_half_open() {
        let schedule = sample();
        assert_eq!(schedule.active_at(Weekday::Mon, t("09:00")).len(), 1);
        assert_eq!(schedule.active_at(Weekday::Mon, t("09:59")).len(), 1);
        assert!(schedule.active_at(Weekday::Mon, t("10:00")).is_empty());
        assert!(schedule.active_at(Weekday::Tue, t("09:30")).is_empty());
    }

    #[test]
    fn next_after_wraps_around_the_week() {
        let schedule = sample();
        let (next, minutes) = schedule.next_after(Weekday::Mon, t("08:30")).unwrap();
        assert_eq!(next.subject, "Math");
        assert_eq!(minutes, 30);

        let (next, minutes) = schedule.next_after(Weekday::Fri, t("12:00")).unwrap();
        assert_eq!(next.subject, "Biology");
        // Fri 12:00 -> Mon 08:00 is 2.5 days + 8h.
        assert_eq!(minutes, 12 * 60 + 2 * 24 * 60 + 8 * 60);
    }

    #[test]
    fn next_after_skips_session_starting_now() {
        let schedule = sample();
        let (next, _) = schedule.next_after(Weekday::Mon, t("08:00")).unwrap();
        assert_eq!(next.subject, "Math");
    }

    #[test]
    fn update_session_revalidates_and_resorts() {
        let mut schedule = sample();
        let id = schedule.sessions[2].id.clone(); // Physics
        let bad = SessionPatch {
            end: Some(t("13:00")),
            ..Default::default()
        };
        assert!(schedule.update_session(&id, bad).is_err());
        assert_eq!(schedule.session(&id).unwrap().end, t("15:30"));

        let moved = SessionPatch {
            day: Some(Weekday::Mon),
            start: Some(t("07:00")),
            end: Some(t("07:30")),
            ..Default::default()
        };
        schedule.update_session(&id, moved).unwrap();
        assert_eq!(schedule.sessions[0].subject, "Physics");
    }

    #[test]
    fn remove_and_find_by_prefix() {
        let mut schedule = sample();
        let id = schedule.sessions[0].id.clone();
        assert_eq!(schedule.find_session(&id[..8]).unwrap().id, id);
        assert!(schedule.find_session("").is_none());
        let removed = schedule.remove_session(&id).unwrap();
        assert_eq!(removed.subject, "Biology");
        assert!(schedule.remove_session(&id).is_err());
    }

    #[test]
    fn weekly_minutes_sums_durations() {
        assert_eq!(sample().weekly_minutes(), 90 + 60 + 45);
    }
}
