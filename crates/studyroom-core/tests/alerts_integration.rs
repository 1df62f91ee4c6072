//! Integration tests for the alert pipeline.
//!
//! Schedule stored in SQLite -> alert engine polled across a restart ->
//! notices delivered through the dispatcher fallback chain.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use studyroom_core::error::Result;
use studyroom_core::notify::{Dispatcher, Notice, Notifier};
use studyroom_core::{AlertEngine, AlertKind, AlertSettings, CoreError, Database, ScheduleDb, Session};

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    // 2024-01-01 is a Monday.
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn session(subject: &str, day: Weekday, start: &str, end: &str) -> Session {
    Session::new(subject, day, start.parse().unwrap(), end.parse().unwrap()).unwrap()
}

struct Failing;

impl Notifier for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn notify(&self, _notice: &Notice) -> Result<()> {
        Err(CoreError::Notification("bus unavailable".into()))
    }
}

#[derive(Clone, Default)]
struct Collecting(Arc<Mutex<Vec<String>>>);

impl Notifier for Collecting {
    fn name(&self) -> &str {
        "collecting"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        self.0.lock().unwrap().push(notice.title.clone());
        Ok(())
    }
}

#[test]
fn stored_schedule_drives_alerts_once_across_restart() {
    let schedules = ScheduleDb::open_memory().unwrap();
    let db = Database::open_memory().unwrap();
    schedules.create_schedule("Finals").unwrap();
    schedules
        .add_session("Finals", session("Physics", Weekday::Mon, "09:00", "10:00"))
        .unwrap();
    schedules
        .add_session("Finals", session("Chemistry", Weekday::Tue, "09:00", "10:00"))
        .unwrap();
    schedules.set_active("Finals").unwrap();

    let settings = AlertSettings {
        lead_minutes: 10,
        ..AlertSettings::default()
    };
    let active = schedules.active_schedule().unwrap().unwrap();

    let mut engine = AlertEngine::new(settings);
    let fired = engine.poll(&active, at(1, 8, 50));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].kind, AlertKind::Upcoming);
    assert_eq!(fired[0].session.subject, "Physics");

    // Persist and restore the way the watch loop does between runs.
    db.kv_set("alert_engine", &serde_json::to_string(&engine).unwrap())
        .unwrap();
    let restored: AlertEngine = serde_json::from_str(&db.kv_get("alert_engine").unwrap().unwrap()).unwrap();
    let mut engine = restored.with_settings(settings);

    assert!(engine.poll(&active, at(1, 8, 50)).is_empty());
    let started = engine.poll(&active, at(1, 9, 0));
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].kind, AlertKind::Started);

    let ended = engine.poll(&active, at(1, 10, 1));
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].kind, AlertKind::Ended);

    // Tuesday's session belongs to Tuesday only.
    assert!(engine.poll(&active, at(1, 23, 59)).is_empty());
    let tuesday = engine.poll(&active, at(2, 9, 0));
    assert_eq!(tuesday.len(), 1);
    assert_eq!(tuesday[0].session.subject, "Chemistry");
}

#[test]
fn schedule_edits_are_seen_by_next_poll() {
    let schedules = ScheduleDb::open_memory().unwrap();
    schedules.create_schedule("Finals").unwrap();
    schedules.set_active("Finals").unwrap();

    let mut engine = AlertEngine::new(AlertSettings::default());
    let active = schedules.active_schedule().unwrap().unwrap();
    assert!(engine.poll(&active, at(1, 8, 59)).is_empty());

    schedules
        .add_session("Finals", session("Physics", Weekday::Mon, "09:00", "10:00"))
        .unwrap();
    let active = schedules.active_schedule().unwrap().unwrap();
    let fired = engine.poll(&active, at(1, 9, 0));
    assert_eq!(fired.len(), 1);
}

#[test]
fn dispatcher_falls_back_when_first_notifier_fails() {
    let collected = Collecting::default();
    let dispatcher = Dispatcher::new(vec![Box::new(Failing), Box::new(collected.clone())]);

    let schedules = ScheduleDb::open_memory().unwrap();
    schedules.create_schedule("Finals").unwrap();
    schedules
        .add_session("Finals", session("Physics", Weekday::Mon, "09:00", "10:00"))
        .unwrap();
    let active = schedules.find_schedule("Finals").unwrap();

    let mut engine = AlertEngine::new(AlertSettings::default());
    for alert in engine.poll(&active, at(1, 9, 0)) {
        let used = dispatcher.dispatch(&alert.notice()).unwrap();
        assert_eq!(used.as_deref(), Some("collecting"));
    }
    assert_eq!(collected.0.lock().unwrap().as_slice(), ["Time to study: Physics"]);
}

#[test]
fn dispatcher_reports_when_every_notifier_fails() {
    let dispatcher = Dispatcher::new(vec![Box::new(Failing)]);
    let schedules = ScheduleDb::open_memory().unwrap();
    schedules.create_schedule("Finals").unwrap();
    schedules
        .add_session("Finals", session("Physics", Weekday::Mon, "09:00", "10:00"))
        .unwrap();
    let active = schedules.find_schedule("Finals").unwrap();

    let mut engine = AlertEngine::new(AlertSettings::default());
    let alerts = engine.poll(&active, at(1, 9, 0));
    let err = dispatcher.dispatch(&alerts[0].notice()).unwrap_err();
    assert!(err.to_string().contains("bus unavailable"));
}
