//! Study-session alerts: the poll loop core that decides when a scheduled
//! session starts, ends, or is about to start.

mod engine;

pub use engine::{AlertEngine, AlertSettings};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::notify::{Notice, NoticeKind};
use crate::schedule::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Upcoming,
    Started,
    Ended,
}

impl AlertKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertKind::Upcoming => "upcoming",
            AlertKind::Started => "started",
            AlertKind::Ended => "ended",
        }
    }
}

/// A session boundary that has been reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub schedule: String,
    pub session: Session,
    /// Local wall-clock time of the boundary.
    pub boundary: NaiveDateTime,
}

impl Alert {
    pub fn to_event(&self) -> Event {
        Event::SessionAlert {
            kind: self.kind,
            schedule: self.schedule.clone(),
            session_id: self.session.id.clone(),
            subject: self.session.subject.clone(),
            day: self.session.day,
            start: self.session.start,
            end: self.session.end,
            at: Utc::now(),
        }
    }

    pub fn notice(&self) -> Notice {
        let s = &self.session;
        let (title, body) = match self.kind {
            AlertKind::Upcoming => (
                format!("{} starts soon", s.subject),
                format!("Study session {}–{} is about to begin.", s.start, s.end),
            ),
            AlertKind::Started => (
                format!("Time to study: {}", s.subject),
                format!("Your session runs until {}.", s.end),
            ),
            AlertKind::Ended => (
                format!("{} session finished", s.subject),
                "Nice work. Take a break before the next one.".to_string(),
            ),
        };
        let body = match &s.notes {
            Some(notes) => format!("{body}\n{notes}"),
            None => body,
        };
        Notice::new(NoticeKind::Session(self.kind), title, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};

    #[test]
    fn notice_text_depends_on_kind() {
        let session = Session::new("Math", Weekday::Mon, "09:00".parse().unwrap(), "10:00".parse().unwrap())
            .unwrap()
            .with_notes("Chapter 4");
        let alert = Alert {
            kind: AlertKind::Started,
            schedule: "Week".into(),
            session,
            boundary: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        let notice = alert.notice();
        assert_eq!(notice.title, "Time to study: Math");
        assert!(notice.body.contains("10:00"));
        assert!(notice.body.ends_with("Chapter 4"));
    }
}
