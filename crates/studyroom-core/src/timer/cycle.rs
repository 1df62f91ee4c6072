use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Study,
    Break,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Study => "study",
            Phase::Break => "break",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub phase: Phase,
    /// Duration in minutes.
    pub duration_min: u64,
    pub label: String,
}

impl Step {
    pub fn study(duration_min: u64, label: impl Into<String>) -> Self {
        Self {
            phase: Phase::Study,
            duration_min,
            label: label.into(),
        }
    }

    pub fn rest(duration_min: u64, label: impl Into<String>) -> Self {
        Self {
            phase: Phase::Break,
            duration_min,
            label: label.into(),
        }
    }

    /// Get step duration in milliseconds.
    ///
    /// Saturates instead of overflowing on absurd durations.
    pub fn duration_ms(&self) -> u64 {
        self.duration_min.saturating_mul(60).saturating_mul(1000)
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_min.saturating_mul(60)
    }
}

/// Upper bound on study rounds before the long break.
pub const MAX_ROUNDS: u32 = 12;

/// The repeating study/break sequence the timer walks through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub steps: Vec<Step>,
}

impl Cycle {
    /// Every step must last at least a minute.
    pub fn new(steps: Vec<Step>) -> Result<Self, ValidationError> {
        if steps.is_empty() {
            return Err(ValidationError::EmptyCollection("timer cycle steps".into()));
        }
        if let Some(step) = steps.iter().find(|s| s.duration_min == 0) {
            return Err(ValidationError::InvalidValue {
                field: "duration_min".into(),
                message: format!("step '{}' must last at least one minute", step.label),
            });
        }
        Ok(Self { steps })
    }

    /// Classic pomodoro: `rounds` study blocks, short breaks between them and
    /// a long break closing the cycle. `rounds` must be within `1..=MAX_ROUNDS`.
    pub fn pomodoro(
        study_min: u64,
        short_break_min: u64,
        long_break_min: u64,
        rounds: u32,
    ) -> Result<Self, ValidationError> {
        if !(1..=MAX_ROUNDS).contains(&rounds) {
            return Err(ValidationError::InvalidValue {
                field: "rounds".into(),
                message: format!("must be between 1 and {MAX_ROUNDS}, got {rounds}"),
            });
        }
        let steps = (1..=rounds)
            .flat_map(|i| {
                let rest = if i == rounds {
                    Step::rest(long_break_min, "Long Break")
                } else {
                    Step::rest(short_break_min, "Short Break")
                };
                [Step::study(study_min, format!("Study {i}")), rest]
            })
            .collect();
        Self::new(steps)
    }

    pub fn total_duration_min(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_min).sum()
    }

    pub fn study_count(&self) -> usize {
        self.steps.iter().filter(|s| s.phase == Phase::Study).count()
    }

    /// Cumulative minutes completed up to (but not including) `step_index`.
    pub fn cumulative_min(&self, step_index: usize) -> u64 {
        self.steps.iter().take(step_index).map(|s| s.duration_min).sum()
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            steps: vec![
                Step::study(25, "Study 1"),
                Step::rest(5, "Short Break"),
                Step::study(25, "Study 2"),
                Step::rest(5, "Short Break"),
                Step::study(25, "Study 3"),
                Step::rest(5, "Short Break"),
                Step::study(25, "Study 4"),
                Step::rest(15, "Long Break"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cycle_matches_four_round_pomodoro() {
        assert_eq!(Cycle::default(), Cycle::pomodoro(25, 5, 15, 4).unwrap());
    }

    #[test]
    fn default_cycle_study_count() {
        assert_eq!(Cycle::default().study_count(), 4);
    }

    #[test]
    fn total_duration() {
        assert_eq!(Cycle::default().total_duration_min(), 4 * 25 + 3 * 5 + 15);
    }

    #[test]
    fn single_round_ends_in_long_break() {
        let cycle = Cycle::pomodoro(50, 10, 20, 1).unwrap();
        assert_eq!(cycle.steps.len(), 2);
        assert_eq!(cycle.steps[1], Step::rest(20, "Long Break"));
    }

    #[test]
    fn rejects_zero_minute_steps() {
        assert!(Cycle::pomodoro(25, 0, 15, 4).is_err());
        assert!(Cycle::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_round_counts_out_of_range() {
        assert!(Cycle::pomodoro(25, 5, 15, 0).is_err());
        assert!(Cycle::pomodoro(25, 5, 15, MAX_ROUNDS + 1).is_err());
        assert!(Cycle::pomodoro(25, 5, 15, 4_000_000_000).is_err());
        assert_eq!(Cycle::pomodoro(25, 5, 15, MAX_ROUNDS).unwrap().study_count(), 12);
    }
}
