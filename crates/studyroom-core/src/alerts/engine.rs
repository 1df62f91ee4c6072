//! Session alert engine.
//!
//! The engine is polled every few seconds with the current local wall-clock
//! time. Each poll looks at the minutes between the previous poll and now
//! and reports every session boundary (start, end, optional early reminder)
//! that falls inside that window. A set of last-fired markers keyed by
//! (date, session, boundary) makes sure an alert is reported once, even when
//! several polls land in the same minute or the engine state is restored
//! from disk.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{Alert, AlertKind};
use crate::schedule::{Schedule, Session};

/// Tunables read from the `[alerts]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSettings {
    /// Minutes before a session's start for the `Upcoming` reminder; 0 disables it.
    pub lead_minutes: u16,
    pub notify_on_end: bool,
    /// How far back a missed boundary may still fire after a poll gap.
    pub grace_minutes: u16,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            lead_minutes: 0,
            notify_on_end: true,
            grace_minutes: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertEngine {
    #[serde(skip)]
    settings: AlertSettings,
    #[serde(default)]
    last_poll: Option<NaiveDateTime>,
    #[serde(default)]
    fired: BTreeSet<String>,
}

impl AlertEngine {
    pub fn new(settings: AlertSettings) -> Self {
        Self {
            settings,
            last_poll: None,
            fired: BTreeSet::new(),
        }
    }

    /// Settings are not persisted with the markers; re-apply them after a restore.
    pub fn with_settings(mut self, settings: AlertSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> AlertSettings {
        self.settings
    }

    pub fn last_poll(&self) -> Option<NaiveDateTime> {
        self.last_poll
    }

    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }

    /// Compare `now` against every session boundary in `schedule` and return
    /// the alerts that are due, ordered by boundary time.
    pub fn poll(&mut self, schedule: &Schedule, now: NaiveDateTime) -> Vec<Alert> {
        let now_min = truncate_to_minute(now);
        let grace = i64::from(self.settings.grace_minutes.max(1));
        let mut lower = now_min - Duration::minutes(grace);
        if let Some(last) = self.last_poll {
            let last_min = truncate_to_minute(last);
            // A clock that went backwards is treated like a fresh start.
            if last <= now && last_min > lower {
                lower = last_min;
            }
        }

        let mut due = Vec::new();
        // A session tomorrow can still owe an early reminder today.
        let last_date = now_min.date().succ_opt().unwrap_or(now_min.date());
        let mut date = lower.date();
        while date <= last_date {
            for session in schedule.sessions_on(date.weekday()) {
                for (kind, boundary) in self.boundaries(date, session) {
                    if boundary <= lower || boundary > now_min {
                        continue;
                    }
                    let marker = marker(date, &session.id, kind);
                    if self.fired.contains(&marker) {
                        continue;
                    }
                    self.fired.insert(marker);
                    due.push(Alert {
                        kind,
                        schedule: schedule.name.clone(),
                        session: session.clone(),
                        boundary,
                    });
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        due.sort_by(|a, b| a.boundary.cmp(&b.boundary).then(a.kind.cmp(&b.kind)));
        for alert in &due {
            tracing::info!(
                kind = ?alert.kind,
                subject = %alert.session.subject,
                boundary = %alert.boundary,
                "session alert due"
            );
        }

        self.prune(now_min.date());
        self.last_poll = Some(now);
        due
    }

    /// Boundaries of `session` held on `date`; the reminder may land on the
    /// previous day.
    fn boundaries(&self, date: NaiveDate, session: &Session) -> Vec<(AlertKind, NaiveDateTime)> {
        let start = date.and_time(session.start.to_naive());
        let mut out = Vec::with_capacity(3);
        if self.settings.lead_minutes > 0 {
            let lead = Duration::minutes(i64::from(self.settings.lead_minutes));
            out.push((AlertKind::Upcoming, start - lead));
        }
        out.push((AlertKind::Started, start));
        if self.settings.notify_on_end {
            out.push((AlertKind::Ended, date.and_time(session.end.to_naive())));
        }
        out
    }

    /// Drop markers older than yesterday; yesterday is kept for polls that
    /// straddle midnight.
    fn prune(&mut self, today: NaiveDate) {
        let Some(cutoff) = today.pred_opt() else {
            return;
        };
        let cutoff = cutoff.format("%Y-%m-%d").to_string();
        self.fired
            .retain(|m| m.split('|').next().is_some_and(|d| d >= cutoff.as_str()));
    }
}

fn marker(date: NaiveDate, session_id: &str, kind: AlertKind) -> String {
    format!("{}|{}|{}", date.format("%Y-%m-%d"), session_id, kind.as_str())
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn schedule() -> Schedule {
        let mut s = Schedule::new("Week").unwrap();
        s.add_session(
            Session::new("Math", Weekday::Mon, "09:00".parse().unwrap(), "10:00".parse().unwrap())
                .unwrap(),
        )
        .unwrap();
        s
    }

    // 2024-01-01 is a Monday.
    fn at(h: u32, m: u32, sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, sec)
            .unwrap()
    }

    #[test]
    fn fires_start_once_per_minute() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        assert!(engine.poll(&schedule, at(8, 59, 50)).is_empty());

        let alerts = engine.poll(&schedule, at(9, 0, 0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Started);

        assert!(engine.poll(&schedule, at(9, 0, 10)).is_empty());
        assert!(engine.poll(&schedule, at(9, 0, 50)).is_empty());
        assert!(engine.poll(&schedule, at(9, 1, 0)).is_empty());
    }

    #[test]
    fn fires_end_and_optional_reminder() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings {
            lead_minutes: 5,
            ..Default::default()
        });
        let alerts = engine.poll(&schedule, at(8, 55, 3));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Upcoming);

        let alerts = engine.poll(&schedule, at(10, 0, 1));
        // 09:00 start is outside the grace window by now.
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Ended);
    }

    #[test]
    fn notify_on_end_can_be_disabled() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings {
            notify_on_end: false,
            ..Default::default()
        });
        assert!(engine.poll(&schedule, at(10, 0, 0)).is_empty());
    }

    #[test]
    fn catches_up_within_grace_after_a_gap() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        engine.poll(&schedule, at(8, 58, 0));
        // Machine slept through 09:00; woke at 09:01:30.
        let alerts = engine.poll(&schedule, at(9, 1, 30));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].boundary, at(9, 0, 0));
    }

    #[test]
    fn skips_boundaries_older_than_grace() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        engine.poll(&schedule, at(8, 0, 0));
        assert!(engine.poll(&schedule, at(9, 30, 0)).is_empty());
    }

    #[test]
    fn other_weekdays_do_not_fire() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert!(engine.poll(&schedule, tuesday).is_empty());
    }

    #[test]
    fn restored_engine_does_not_refire() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        assert_eq!(engine.poll(&schedule, at(9, 0, 0)).len(), 1);

        let json = serde_json::to_string(&engine).unwrap();
        let mut restored: AlertEngine = serde_json::from_str::<AlertEngine>(&json)
            .unwrap()
            .with_settings(AlertSettings::default());
        restored.last_poll = None;
        assert!(restored.poll(&schedule, at(9, 0, 20)).is_empty());
    }

    #[test]
    fn fires_again_next_week() {
        let schedule = schedule();
        let mut engine = AlertEngine::new(AlertSettings::default());
        assert_eq!(engine.poll(&schedule, at(9, 0, 0)).len(), 1);
        let next_monday = NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(engine.poll(&schedule, next_monday).len(), 1);
        // Last week's marker was pruned.
        assert_eq!(engine.fired_count(), 1);
    }

    #[test]
    fn alerts_are_ordered_by_boundary() {
        let mut schedule = schedule();
        schedule
            .add_session(
                Session::new("Chem", Weekday::Mon, "10:00".parse().unwrap(), "11:00".parse().unwrap())
                    .unwrap(),
            )
            .unwrap();
        let mut engine = AlertEngine::new(AlertSettings::default());
        let alerts = engine.poll(&schedule, at(10, 0, 0));
        let kinds: Vec<_> = alerts.iter().map(|a| (a.session.subject.as_str(), a.kind)).collect();
        assert_eq!(
            kinds,
            vec![("Chem", AlertKind::Started), ("Math", AlertKind::Ended)]
        );
    }

    #[test]
    fn window_straddles_midnight() {
        let mut schedule = Schedule::new("Night").unwrap();
        schedule
            .add_session(
                Session::new("Reading", Weekday::Tue, "00:00".parse().unwrap(), "00:30".parse().unwrap())
                    .unwrap(),
            )
            .unwrap();
        let mut engine = AlertEngine::new(AlertSettings::default());
        engine.poll(&schedule, at(23, 59, 55));
        let tuesday = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 5)
            .unwrap();
        assert_eq!(engine.poll(&schedule, tuesday).len(), 1);
    }

    #[test]
    fn reminder_crosses_midnight() {
        let mut schedule = Schedule::new("Night").unwrap();
        schedule
            .add_session(
                Session::new("Reading", Weekday::Tue, "00:03".parse().unwrap(), "01:00".parse().unwrap())
                    .unwrap(),
            )
            .unwrap();
        let mut engine = AlertEngine::new(AlertSettings {
            lead_minutes: 5,
            ..Default::default()
        });
        let tuesday = |m: u32, s: u32| {
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(0, m, s)
                .unwrap()
        };

        let mut fired = Vec::new();
        let mut now = at(23, 50, 0);
        while now <= tuesday(5, 0) {
            fired.extend(engine.poll(&schedule, now).into_iter().map(|a| (a.kind, a.boundary)));
            now += Duration::seconds(10);
        }
        assert_eq!(
            fired,
            vec![
                (AlertKind::Upcoming, at(23, 58, 0)),
                (AlertKind::Started, tuesday(3, 0)),
            ]
        );
    }
}
