//! Foreground loop: poll the active schedule for session alerts and tick the
//! Pomodoro timer, notifying through the configured notifier chain.

use chrono::Local;
use clap::Args;
use studyroom_core::notify::{Dispatcher, Notice};
use studyroom_core::storage::Database;
use studyroom_core::{AlertEngine, Config, ScheduleDb};
use tokio::time::MissedTickBehavior;

use super::timer::{load_engine, record_completions, save_engine};

const ALERT_ENGINE_KEY: &str = "alert_engine";

#[derive(Args)]
pub struct WatchArgs {
    /// Poll once and exit
    #[arg(long)]
    once: bool,
    /// Only watch the schedule; leave the timer alone
    #[arg(long)]
    no_timer: bool,
}

struct Watcher {
    config: Config,
    db: Database,
    schedules: ScheduleDb,
    dispatcher: Dispatcher,
    alerts: AlertEngine,
    tick_timer: bool,
}

impl Watcher {
    fn new(config: Config, tick_timer: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open()?;
        let alerts = match db.kv_get(ALERT_ENGINE_KEY)? {
            Some(json) => serde_json::from_str::<AlertEngine>(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable alert state");
                AlertEngine::default()
            }),
            None => AlertEngine::default(),
        }
        .with_settings(config.alert_settings());

        Ok(Self {
            dispatcher: Dispatcher::from_config(&config.notifications),
            schedules: ScheduleDb::open()?,
            db,
            alerts,
            tick_timer,
            config,
        })
    }

    fn deliver(&self, notice: &Notice) {
        if let Err(e) = self.dispatcher.dispatch(notice) {
            tracing::warn!(error = %e, title = %notice.title, "notice not delivered");
        }
    }

    fn poll(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.config.alerts.enabled {
            if let Some(schedule) = self.schedules.active_schedule()? {
                let now = Local::now().naive_local();
                for alert in self.alerts.poll(&schedule, now) {
                    println!("{}", serde_json::to_string(&alert.to_event())?);
                    self.deliver(&alert.notice());
                }
                self.db
                    .kv_set(ALERT_ENGINE_KEY, &serde_json::to_string(&self.alerts)?)?;
            }
        }

        if self.tick_timer {
            let mut engine = load_engine(&self.db, &self.config);
            let events = engine.tick();
            if !events.is_empty() {
                record_completions(&self.db, &events)?;
                for event in &events {
                    println!("{}", serde_json::to_string(event)?);
                    if let Some(notice) = Notice::from_timer_event(event) {
                        self.deliver(&notice);
                    }
                }
                save_engine(&self.db, &engine)?;
            }
        }
        Ok(())
    }
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let mut watcher = Watcher::new(config, !args.no_timer)?;

    if args.once {
        return watcher.poll();
    }

    let interval = watcher.config.poll_interval();
    tracing::info!(interval_secs = interval.as_secs(), "watching");
    super::runtime()?.block_on(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = watcher.poll() {
                        tracing::warn!(error = %e, "poll failed");
                    }
                }
                _ = &mut ctrl_c => {
                    eprintln!("stopped");
                    break;
                }
            }
        }
        Ok(())
    })
}
