//! System notifications via notify-rust.

use notify_rust::{Notification, Timeout};

use super::{Notice, Notifier};
use crate::error::{CoreError, Result};

const APP_NAME: &str = "studyroom";

pub struct DesktopNotifier {
    sound: bool,
}

impl DesktopNotifier {
    pub fn new(sound: bool) -> Self {
        Self { sound }
    }
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(&notice.title)
            .body(&notice.body)
            .timeout(Timeout::Milliseconds(10_000));

        #[cfg(target_os = "macos")]
        if self.sound {
            notification.sound_name("Glass");
        }

        notification
            .show()
            .map(|_| ())
            .map_err(|e| CoreError::Notification(format!("desktop notification failed: {e}")))
    }

    fn plays_sound(&self) -> bool {
        cfg!(target_os = "macos") && self.sound
    }
}
