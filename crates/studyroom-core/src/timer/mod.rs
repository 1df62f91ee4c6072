mod cycle;
mod engine;

pub use cycle::{Cycle, Phase, Step, MAX_ROUNDS};
pub use engine::{TimerEngine, TimerState};
