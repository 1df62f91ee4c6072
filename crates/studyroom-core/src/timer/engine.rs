//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller is responsible for calling `tick()`
//! periodically. Because progress is derived from timestamps rather than
//! from counting ticks, the engine can be serialized, dropped, and restored
//! later (the CLI stores it between invocations) without losing time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused <-> Running) -> Completed -> Running ...
//! ```
//!
//! With `auto_advance` enabled a finished step rolls straight into the next
//! one, so the engine never rests in `Completed`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(cycle);
//! engine.start();
//! // In a loop:
//! for event in engine.tick() { /* notify */ }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::cycle::{Cycle, Phase, Step};
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Step finished and `auto_advance` is off; waiting for `start`.
    Completed,
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerEngine {
    cycle: Cycle,
    state: TimerState,
    step_index: usize,
    /// Remaining time in milliseconds for the current step.
    remaining_ms: u64,
    /// Timestamp (ms since epoch) of the last flush while running.
    #[serde(default)]
    last_tick_epoch_ms: Option<u64>,
    /// When the current step was first started.
    #[serde(default)]
    step_started_epoch_ms: Option<u64>,
    #[serde(default = "default_auto_advance")]
    auto_advance: bool,
    /// Study steps finished since the last reset.
    #[serde(default)]
    completed_study: u32,
}

fn default_auto_advance() -> bool {
    true
}

impl TimerEngine {
    /// Create a new timer engine with the given cycle.
    ///
    /// Starts in the `Idle` state with the first step ready.
    pub fn new(cycle: Cycle) -> Self {
        let remaining_ms = cycle.steps.first().map(|s| s.duration_ms()).unwrap_or(0);
        Self {
            cycle,
            state: TimerState::Idle,
            step_index: 0,
            remaining_ms,
            last_tick_epoch_ms: None,
            step_started_epoch_ms: None,
            auto_advance: true,
            completed_study: 0,
        }
    }

    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.cycle.steps.get(self.step_index)
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance
    }

    pub fn completed_study(&self) -> u32 {
        self.completed_study
    }

    pub fn total_ms(&self) -> u64 {
        self.current_step().map(|s| s.duration_ms()).unwrap_or(0)
    }

    /// 0.0 .. 1.0 progress within current step.
    pub fn step_progress(&self) -> f64 {
        let total = self.total_ms();
        if total == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_ms as f64 / total as f64)
    }

    /// 0.0 .. 100.0 progress across the entire cycle.
    pub fn cycle_progress_pct(&self) -> f64 {
        let total_min = self.cycle.total_duration_min() as f64;
        if total_min == 0.0 {
            return 0.0;
        }
        let completed_min = self.cycle.cumulative_min(self.step_index) as f64;
        let current_step_min = self
            .current_step()
            .map(|s| s.duration_min as f64)
            .unwrap_or(0.0);
        let current_elapsed_min = current_step_min * self.step_progress();
        ((completed_min + current_elapsed_min) / total_min * 100.0).min(100.0)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let step = self.current_step();
        Event::StateSnapshot {
            state: self.state,
            step_index: self.step_index,
            phase: step.map(|s| s.phase).unwrap_or(Phase::Study),
            step_label: step.map(|s| s.label.clone()).unwrap_or_default(),
            remaining_ms: self.remaining_ms,
            total_ms: self.total_ms(),
            cycle_progress_pct: self.cycle_progress_pct(),
            completed_study: self.completed_study,
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.start_at(now_ms())
    }

    pub fn start_at(&mut self, now: u64) -> Option<Event> {
        match self.state {
            TimerState::Idle | TimerState::Completed => {
                if self.state == TimerState::Completed {
                    self.advance();
                }
                self.state = TimerState::Running;
                self.last_tick_epoch_ms = Some(now);
                self.step_started_epoch_ms = Some(now);
                let step = self.current_step()?;
                Some(Event::TimerStarted {
                    step_index: self.step_index,
                    phase: step.phase,
                    label: step.label.clone(),
                    duration_secs: step.duration_secs(),
                    at: at(now),
                })
            }
            TimerState::Paused => self.resume_at(now),
            TimerState::Running => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.pause_at(now_ms())
    }

    /// Elapsed time is flushed but a step that ran out while unobserved is
    /// only reported by the next `tick` after resuming.
    pub fn pause_at(&mut self, now: u64) -> Option<Event> {
        match self.state {
            TimerState::Running => {
                self.flush_elapsed(now);
                self.state = TimerState::Paused;
                self.last_tick_epoch_ms = None;
                Some(Event::TimerPaused {
                    remaining_ms: self.remaining_ms,
                    at: at(now),
                })
            }
            _ => None,
        }
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.resume_at(now_ms())
    }

    pub fn resume_at(&mut self, now: u64) -> Option<Event> {
        match self.state {
            TimerState::Paused => {
                self.state = TimerState::Running;
                self.last_tick_epoch_ms = Some(now);
                Some(Event::TimerResumed {
                    remaining_ms: self.remaining_ms,
                    at: at(now),
                })
            }
            _ => None,
        }
    }

    pub fn skip(&mut self) -> Option<Event> {
        let from = self.step_index;
        self.state = TimerState::Idle;
        self.last_tick_epoch_ms = None;
        self.step_started_epoch_ms = None;
        self.advance();
        Some(Event::TimerSkipped {
            from_step: from,
            to_step: self.step_index,
            at: Utc::now(),
        })
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.step_index = 0;
        self.last_tick_epoch_ms = None;
        self.step_started_epoch_ms = None;
        self.completed_study = 0;
        self.remaining_ms = self
            .cycle
            .steps
            .first()
            .map(|s| s.duration_ms())
            .unwrap_or(0);
        Some(Event::TimerReset { at: Utc::now() })
    }

    /// Call periodically. Returns the steps that finished since the last
    /// call (`StepCompleted`, followed by `StepAdvanced` when auto-advancing).
    pub fn tick(&mut self) -> Vec<Event> {
        self.tick_at(now_ms())
    }

    /// After a long gap several steps can complete in one call; catch-up is
    /// capped at one full cycle and any further elapsed time is dropped.
    pub fn tick_at(&mut self, now: u64) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != TimerState::Running {
            return events;
        }

        let mut elapsed = self
            .last_tick_epoch_ms
            .map(|last| now.saturating_sub(last))
            .unwrap_or(0);
        self.last_tick_epoch_ms = Some(now);

        let mut completions = 0;
        loop {
            if elapsed < self.remaining_ms {
                self.remaining_ms -= elapsed;
                break;
            }
            if completions >= self.cycle.steps.len() {
                tracing::debug!(dropped_ms = elapsed, "timer catch-up capped at one cycle");
                break;
            }
            elapsed -= self.remaining_ms;
            self.remaining_ms = 0;
            let finished_at = now.saturating_sub(elapsed);
            if let Some(event) = self.complete_step(finished_at) {
                events.push(event);
            }
            completions += 1;

            if !self.auto_advance {
                self.state = TimerState::Completed;
                self.last_tick_epoch_ms = None;
                break;
            }

            self.advance();
            self.step_started_epoch_ms = Some(finished_at);
            if let Some(step) = self.current_step() {
                events.push(Event::StepAdvanced {
                    step_index: self.step_index,
                    phase: step.phase,
                    label: step.label.clone(),
                    duration_secs: step.duration_secs(),
                    at: at(finished_at),
                });
            }
        }
        events
    }

    pub fn set_cycle(&mut self, cycle: Cycle) {
        self.cycle = cycle;
        self.reset();
    }

    pub fn set_auto_advance(&mut self, auto_advance: bool) {
        self.auto_advance = auto_advance;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete_step(&mut self, finished_at: u64) -> Option<Event> {
        let step = self.cycle.steps.get(self.step_index)?;
        if step.phase == Phase::Study {
            self.completed_study = self.completed_study.saturating_add(1);
        }
        Some(Event::StepCompleted {
            step_index: self.step_index,
            phase: step.phase,
            label: step.label.clone(),
            duration_min: step.duration_min,
            started_at: self.step_started_epoch_ms.map(at),
            at: at(finished_at),
        })
    }

    fn flush_elapsed(&mut self, now: u64) {
        if let Some(last) = self.last_tick_epoch_ms {
            let elapsed = now.saturating_sub(last);
            self.remaining_ms = self.remaining_ms.saturating_sub(elapsed);
            self.last_tick_epoch_ms = Some(now);
        }
    }

    fn advance(&mut self) {
        let next = if self.step_index + 1 < self.cycle.steps.len() {
            self.step_index + 1
        } else {
            0 // Wrap around.
        };
        self.step_index = next;
        self.remaining_ms = self
            .cycle
            .steps
            .get(next)
            .map(|s| s.duration_ms())
            .unwrap_or(0);
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn at(epoch_ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u64 = 60_000;
    const T0: u64 = 1_700_000_000_000;

    fn short_cycle() -> Cycle {
        Cycle::new(vec![Step::study(2, "Study"), Step::rest(1, "Break")]).unwrap()
    }

    #[test]
    fn start_pause_resume() {
        let mut engine = TimerEngine::new(Cycle::default());
        assert_eq!(engine.state(), TimerState::Idle);

        assert!(engine.start_at(T0).is_some());
        assert_eq!(engine.state(), TimerState::Running);
        assert!(engine.start_at(T0).is_none());

        assert!(engine.pause_at(T0 + MIN).is_some());
        assert_eq!(engine.state(), TimerState::Paused);
        assert_eq!(engine.remaining_ms(), 24 * MIN);

        assert!(engine.resume_at(T0 + 10 * MIN).is_some());
        assert_eq!(engine.state(), TimerState::Running);
        // Time spent paused does not count.
        assert!(engine.tick_at(T0 + 11 * MIN).is_empty());
        assert_eq!(engine.remaining_ms(), 23 * MIN);
    }

    #[test]
    fn skip_advances_step() {
        let mut engine = TimerEngine::new(Cycle::default());
        assert_eq!(engine.step_index(), 0);
        engine.skip();
        assert_eq!(engine.step_index(), 1);
        assert_eq!(engine.current_step().unwrap().phase, Phase::Break);
    }

    #[test]
    fn reset_goes_to_beginning() {
        let mut engine = TimerEngine::new(Cycle::default());
        engine.skip();
        engine.skip();
        assert_eq!(engine.step_index(), 2);
        engine.reset();
        assert_eq!(engine.step_index(), 0);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn tick_alternates_study_and_break() {
        let mut engine = TimerEngine::new(short_cycle());
        engine.start_at(T0);

        let events = engine.tick_at(T0 + 2 * MIN);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::StepCompleted { phase: Phase::Study, .. }));
        assert!(matches!(events[1], Event::StepAdvanced { phase: Phase::Break, .. }));
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.remaining_ms(), MIN);
        assert_eq!(engine.completed_study(), 1);
    }

    #[test]
    fn tick_carries_surplus_into_next_step() {
        let mut engine = TimerEngine::new(short_cycle());
        engine.start_at(T0);
        // 2m study + 1m break + 30s into the next study.
        let events = engine.tick_at(T0 + 3 * MIN + 30_000);
        let completed = events
            .iter()
            .filter(|e| matches!(e, Event::StepCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
        assert_eq!(engine.step_index(), 0);
        assert_eq!(engine.remaining_ms(), 2 * MIN - 30_000);
    }

    #[test]
    fn catch_up_is_capped_at_one_cycle() {
        let mut engine = TimerEngine::new(short_cycle());
        engine.start_at(T0);
        let events = engine.tick_at(T0 + 24 * 60 * MIN);
        let completed = events
            .iter()
            .filter(|e| matches!(e, Event::StepCompleted { .. }))
            .count();
        assert_eq!(completed, 2);
        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.remaining_ms(), 2 * MIN);
    }

    #[test]
    fn without_auto_advance_stops_in_completed() {
        let mut engine = TimerEngine::new(short_cycle()).with_auto_advance(false);
        engine.start_at(T0);
        let events = engine.tick_at(T0 + 5 * MIN);
        assert_eq!(events.len(), 1);
        assert_eq!(engine.state(), TimerState::Completed);
        assert!(engine.tick_at(T0 + 6 * MIN).is_empty());

        engine.start_at(T0 + 7 * MIN);
        assert_eq!(engine.step_index(), 1);
        assert_eq!(engine.remaining_ms(), MIN);
    }

    #[test]
    fn completed_step_reports_start_time() {
        let mut engine = TimerEngine::new(short_cycle());
        engine.start_at(T0);
        let events = engine.tick_at(T0 + 2 * MIN);
        match &events[0] {
            Event::StepCompleted { started_at, at: finished, .. } => {
                assert_eq!(started_at.unwrap().timestamp_millis() as u64, T0);
                assert_eq!(finished.timestamp_millis() as u64, T0 + 2 * MIN);
            }
            other => panic!("Expected StepCompleted, got {other:?}"),
        }
    }

    #[test]
    fn survives_serialization_while_running() {
        let mut engine = TimerEngine::new(short_cycle());
        engine.start_at(T0);
        let json = serde_json::to_string(&engine).unwrap();
        let mut restored: TimerEngine = serde_json::from_str(&json).unwrap();
        let events = restored.tick_at(T0 + 2 * MIN);
        assert!(matches!(events[0], Event::StepCompleted { .. }));
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let engine = TimerEngine::new(Cycle::default());
        match engine.snapshot() {
            Event::StateSnapshot {
                state,
                step_index,
                remaining_ms,
                phase,
                ..
            } => {
                assert_eq!(state, TimerState::Idle);
                assert_eq!(step_index, 0);
                assert_eq!(phase, Phase::Study);
                assert_eq!(remaining_ms, 25 * 60 * 1000);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
