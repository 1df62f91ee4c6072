//! Notification dispatch.
//!
//! Alerts and timer events are turned into [`Notice`]s and handed to a
//! [`Dispatcher`], which walks an ordered chain of [`Notifier`]s until one of
//! them delivers. Desktop notifications are tried first; the terminal notifier
//! is the last resort and never fails unless stderr is gone.

mod desktop;
mod terminal;

pub use desktop::DesktopNotifier;
pub use terminal::{ring_bell, TerminalNotifier};

use serde::Serialize;

use crate::alerts::AlertKind;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::storage::config::NotificationsConfig;
use crate::timer::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "kind", rename_all = "lowercase")]
pub enum NoticeKind {
    Session(AlertKind),
    /// The phase that just finished.
    Timer(Phase),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Notice for a finished timer step, `None` for events that do not warrant one.
    pub fn from_timer_event(event: &Event) -> Option<Self> {
        match event {
            Event::StepCompleted { phase, label, duration_min, .. } => {
                let (title, body) = match phase {
                    Phase::Study => (
                        "Study block complete".to_string(),
                        format!("{label} done ({duration_min}m). Time for a break."),
                    ),
                    Phase::Break => (
                        "Break is over".to_string(),
                        format!("{label} finished. Back to studying."),
                    ),
                };
                Some(Self::new(NoticeKind::Timer(*phase), title, body))
            }
            _ => None,
        }
    }
}

/// A way of getting a notice in front of the user.
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs (e.g. "desktop", "terminal").
    fn name(&self) -> &str;

    fn notify(&self, notice: &Notice) -> Result<()>;

    /// Whether delivery already includes an audible cue.
    fn plays_sound(&self) -> bool {
        false
    }
}

/// Ordered fallback chain of notifiers.
pub struct Dispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
    enabled: bool,
    sound: bool,
}

impl Dispatcher {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            notifiers,
            enabled: true,
            sound: false,
        }
    }

    /// Desktop first (when enabled), terminal always last.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if config.desktop {
            notifiers.push(Box::new(DesktopNotifier::new(config.sound)));
        }
        notifiers.push(Box::new(TerminalNotifier::new(config.sound)));
        Self {
            notifiers,
            enabled: config.enabled,
            sound: config.sound,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Deliver `notice` through the first notifier that succeeds. Returns the
    /// name of that notifier, or `None` when notifications are disabled.
    pub fn dispatch(&self, notice: &Notice) -> Result<Option<String>> {
        if !self.enabled {
            tracing::debug!(title = %notice.title, "notifications disabled, dropping notice");
            return Ok(None);
        }

        let mut failures = Vec::new();
        for notifier in &self.notifiers {
            match notifier.notify(notice) {
                Ok(()) => {
                    if self.sound && !notifier.plays_sound() {
                        ring_bell();
                    }
                    tracing::debug!(notifier = notifier.name(), title = %notice.title, "notice delivered");
                    return Ok(Some(notifier.name().to_string()));
                }
                Err(e) => {
                    tracing::warn!(notifier = notifier.name(), error = %e, "notifier failed, trying next");
                    failures.push(format!("{}: {e}", notifier.name()));
                }
            }
        }

        if failures.is_empty() {
            return Err(CoreError::Notification("no notifiers configured".into()));
        }
        Err(CoreError::Notification(failures.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        name: &'static str,
        fail: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Notifier for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn notify(&self, notice: &Notice) -> Result<()> {
            if self.fail {
                return Err(CoreError::Notification(format!("{} unavailable", self.name)));
            }
            self.seen.lock().unwrap().push(notice.title.clone());
            Ok(())
        }
    }

    fn notice() -> Notice {
        Notice::new(NoticeKind::Session(AlertKind::Started), "Time to study", "Math")
    }

    #[test]
    fn first_working_notifier_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(Recording { name: "desktop", fail: true, seen: seen.clone() }),
            Box::new(Recording { name: "terminal", fail: false, seen: seen.clone() }),
            Box::new(Recording { name: "never", fail: false, seen: seen.clone() }),
        ]);
        let used = dispatcher.dispatch(&notice()).unwrap();
        assert_eq!(used.as_deref(), Some("terminal"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn all_failing_is_an_error_listing_each() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = Dispatcher::new(vec![
            Box::new(Recording { name: "a", fail: true, seen: seen.clone() }),
            Box::new(Recording { name: "b", fail: true, seen }),
        ]);
        let err = dispatcher.dispatch(&notice()).unwrap_err().to_string();
        assert!(err.contains("a unavailable"));
        assert!(err.contains("b unavailable"));
    }

    #[test]
    fn disabled_dispatcher_drops_notices() {
        let config = NotificationsConfig {
            enabled: false,
            desktop: false,
            sound: false,
        };
        let dispatcher = Dispatcher::from_config(&config);
        assert!(!dispatcher.is_enabled());
        assert_eq!(dispatcher.dispatch(&notice()).unwrap(), None);
    }

    #[test]
    fn timer_notice_only_for_completed_steps() {
        let done = Event::StepCompleted {
            step_index: 0,
            phase: Phase::Study,
            label: "Study 1".into(),
            duration_min: 25,
            started_at: None,
            at: chrono::Utc::now(),
        };
        let notice = Notice::from_timer_event(&done).unwrap();
        assert_eq!(notice.kind, NoticeKind::Timer(Phase::Study));
        assert!(notice.body.contains("25m"));

        let reset = Event::TimerReset { at: chrono::Utc::now() };
        assert!(Notice::from_timer_event(&reset).is_none());
    }
}
