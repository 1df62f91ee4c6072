use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertKind;
use crate::schedule::ClockTime;
use crate::timer::{Phase, TimerState};

/// Every state change in the system produces an Event.
/// The CLI prints them as JSON; the watch loop turns some into notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        step_index: usize,
        phase: Phase,
        label: String,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    StepCompleted {
        step_index: usize,
        phase: Phase,
        label: String,
        duration_min: u64,
        started_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    StepAdvanced {
        step_index: usize,
        phase: Phase,
        label: String,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerSkipped {
        from_step: usize,
        to_step: usize,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        step_index: usize,
        phase: Phase,
        step_label: String,
        remaining_ms: u64,
        total_ms: u64,
        cycle_progress_pct: f64,
        completed_study: u32,
        at: DateTime<Utc>,
    },
    /// A scheduled study session reached one of its boundaries.
    SessionAlert {
        kind: AlertKind,
        schedule: String,
        session_id: String,
        subject: String,
        day: Weekday,
        start: ClockTime,
        end: ClockTime,
        at: DateTime<Utc>,
    },
}
