use chrono::{Datelike, Local};
use clap::Subcommand;
use serde_json::json;
use studyroom_core::schedule::{parse_weekday, ClockTime, Schedule, Session, SessionPatch};
use studyroom_core::ScheduleDb;

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Create an empty schedule
    Create {
        name: String,
        /// Also make it the active schedule
        #[arg(long)]
        activate: bool,
    },
    /// List schedules
    List,
    /// Show a schedule and its sessions (defaults to the active one)
    Show { schedule: Option<String> },
    /// Make a schedule the one `watch` follows
    Use { schedule: String },
    /// Rename a schedule
    Rename { schedule: String, new_name: String },
    /// Delete a schedule and its sessions
    Delete { schedule: String },
    /// Add a study session
    AddSession {
        /// Subject being studied
        subject: String,
        /// Weekday: mon..sun, full names, or 0-6 with 0 = Sunday
        #[arg(long)]
        day: String,
        /// Start time (HH:mm)
        #[arg(long)]
        start: String,
        /// End time (HH:mm), after the start
        #[arg(long)]
        end: String,
        #[arg(long)]
        notes: Option<String>,
        /// Target schedule (defaults to the active one)
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Change a session's subject, day, times or notes
    EditSession {
        /// Session id or unique id prefix
        session: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        day: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// New notes ("" clears them)
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Remove a session
    RemoveSession {
        /// Session id or unique id prefix
        session: String,
        #[arg(long)]
        schedule: Option<String>,
    },
    /// Today's sessions, what is running now and what comes next
    Today {
        #[arg(long)]
        schedule: Option<String>,
    },
}

/// Named schedule, or the active one.
fn resolve(db: &ScheduleDb, schedule: Option<&str>) -> Result<Schedule, Box<dyn std::error::Error>> {
    match schedule {
        Some(key) => Ok(db.find_schedule(key)?),
        None => db
            .active_schedule()?
            .ok_or_else(|| "no active schedule (run `studyroom schedule use <name>`)".into()),
    }
}

fn summary(schedule: &Schedule, active_id: Option<&str>) -> serde_json::Value {
    json!({
        "id": schedule.id,
        "name": schedule.name,
        "sessions": schedule.sessions.len(),
        "weekly_minutes": schedule.weekly_minutes(),
        "active": active_id == Some(schedule.id.as_str()),
    })
}

pub fn run(action: ScheduleAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = ScheduleDb::open()?;

    match action {
        ScheduleAction::Create { name, activate } => {
            let schedule = db.create_schedule(&name)?;
            if activate {
                db.set_active(&schedule.id)?;
            }
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::List => {
            let active = db.active_schedule()?.map(|s| s.id);
            let list: Vec<_> = db
                .list_schedules()?
                .iter()
                .map(|s| summary(s, active.as_deref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        ScheduleAction::Show { schedule } => {
            let schedule = resolve(&db, schedule.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleAction::Use { schedule } => {
            let schedule = db.set_active(&schedule)?;
            println!("active schedule: {}", schedule.name);
        }
        ScheduleAction::Rename { schedule, new_name } => {
            let schedule = db.rename_schedule(&schedule, &new_name)?;
            println!("renamed to: {}", schedule.name);
        }
        ScheduleAction::Delete { schedule } => {
            let schedule = db.delete_schedule(&schedule)?;
            println!("deleted schedule: {}", schedule.name);
        }
        ScheduleAction::AddSession {
            subject,
            day,
            start,
            end,
            notes,
            schedule,
        } => {
            let target = resolve(&db, schedule.as_deref())?;
            let mut session = Session::new(
                &subject,
                parse_weekday(&day)?,
                start.parse::<ClockTime>()?,
                end.parse::<ClockTime>()?,
            )?;
            if let Some(notes) = notes {
                session = session.with_notes(notes);
            }
            let id = session.id.clone();
            let updated = db.add_session(&target.id, session)?;
            if let Some(session) = updated.session(&id) {
                println!("{}", serde_json::to_string_pretty(session)?);
            }
        }
        ScheduleAction::EditSession {
            session,
            subject,
            day,
            start,
            end,
            notes,
            schedule,
        } => {
            let target = resolve(&db, schedule.as_deref())?;
            let patch = SessionPatch {
                subject,
                day: day.as_deref().map(parse_weekday).transpose()?,
                start: start.as_deref().map(str::parse::<ClockTime>).transpose()?,
                end: end.as_deref().map(str::parse::<ClockTime>).transpose()?,
                notes: notes.map(|n| if n.trim().is_empty() { None } else { Some(n) }),
            };
            let updated = db.update_session(&target.id, &session, patch)?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        ScheduleAction::RemoveSession { session, schedule } => {
            let target = resolve(&db, schedule.as_deref())?;
            let removed = db.remove_session(&target.id, &session)?;
            println!("removed session: {} ({})", removed.subject, removed.id);
        }
        ScheduleAction::Today { schedule } => {
            let schedule = resolve(&db, schedule.as_deref())?;
            let now = Local::now().naive_local();
            let day = now.date().weekday();
            let time = ClockTime::from_naive(now.time());

            let today: Vec<&Session> = schedule.sessions_on(day).collect();
            let active = schedule.active_at(day, time);
            let next = schedule.next_after(day, time).map(|(session, minutes)| {
                json!({ "session": session, "starts_in_minutes": minutes })
            });
            let out = json!({
                "schedule": schedule.name,
                "day": day,
                "time": time,
                "sessions": today,
                "active": active,
                "next": next,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
