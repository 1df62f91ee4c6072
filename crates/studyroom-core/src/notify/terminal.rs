//! Last-resort notifier: print to a terminal stream and ring the bell.

use std::io::{self, Write};
use std::sync::Mutex;

use super::{Notice, Notifier};
use crate::error::Result;

pub struct TerminalNotifier {
    sound: bool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalNotifier {
    /// Writes to stderr so stdout stays machine-readable.
    pub fn new(sound: bool) -> Self {
        Self::with_writer(sound, Box::new(io::stderr()))
    }

    pub fn with_writer(sound: bool, out: Box<dyn Write + Send>) -> Self {
        Self {
            sound,
            out: Mutex::new(out),
        }
    }
}

impl Notifier for TerminalNotifier {
    fn name(&self) -> &str {
        "terminal"
    }

    fn notify(&self, notice: &Notice) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let bell = if self.sound { "\x07" } else { "" };
        writeln!(out, "{bell}[studyroom] {}: {}", notice.title, notice.body)?;
        out.flush()?;
        Ok(())
    }

    fn plays_sound(&self) -> bool {
        self.sound
    }
}

/// Audible cue for notifiers that cannot play one themselves.
pub fn ring_bell() {
    let mut err = io::stderr();
    let _ = err.write_all(b"\x07");
    let _ = err.flush();
}
