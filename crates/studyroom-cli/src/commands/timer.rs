use clap::Subcommand;
use studyroom_core::storage::Database;
use studyroom_core::timer::{TimerEngine, TimerState};
use studyroom_core::{Config, Event};

const ENGINE_KEY: &str = "timer_engine";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the current step (or resume if paused)
    Start,
    /// Pause the running step
    Pause,
    /// Resume a paused step
    Resume,
    /// Skip to the next step
    Skip,
    /// Reset to the first step of the cycle
    Reset,
    /// Print current timer state as JSON
    Status,
}

pub(crate) fn load_engine(db: &Database, config: &Config) -> TimerEngine {
    let mut engine = match db.kv_get(ENGINE_KEY) {
        Ok(Some(json)) => serde_json::from_str::<TimerEngine>(&json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "discarding unreadable timer state");
            TimerEngine::new(config.cycle())
        }),
        _ => TimerEngine::new(config.cycle()),
    };

    // Pick up [timer] changes as long as nothing is in progress.
    let cycle = config.cycle();
    if engine.state() == TimerState::Idle && engine.step_index() == 0 && *engine.cycle() != cycle {
        engine.set_cycle(cycle);
    }
    engine.set_auto_advance(config.timer.auto_advance);
    engine
}

pub(crate) fn save_engine(db: &Database, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(engine)?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

/// Store every finished step in the history table.
pub(crate) fn record_completions(db: &Database, events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        if let Event::StepCompleted {
            phase,
            label,
            duration_min,
            started_at,
            at,
            ..
        } = event
        {
            let started = started_at.unwrap_or_else(|| *at - chrono::Duration::minutes(*duration_min as i64));
            db.record_pomodoro(*phase, label, *duration_min, started, *at)?;
        }
    }
    Ok(())
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let db = Database::open()?;
    let mut engine = load_engine(&db, &config);

    // Settle time that passed since the last invocation first.
    let completed = engine.tick();
    record_completions(&db, &completed)?;
    for event in &completed {
        print_event(event)?;
    }

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Skip => engine.skip(),
        TimerAction::Reset => engine.reset(),
        TimerAction::Status => None,
    };

    match event {
        Some(event) => print_event(&event)?,
        None => print_event(&engine.snapshot())?,
    }

    save_engine(&db, &engine)?;
    Ok(())
}
