pub mod config;
pub mod database;
pub mod migrations;
pub mod schedule_db;

pub use config::Config;
pub use database::{ChatMessage, ChatRole, Database, PomodoroRecord, Stats};
pub use schedule_db::ScheduleDb;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `STUDYROOM_DATA_DIR` overrides the location entirely. Otherwise it is
/// `~/.config/studyroom/`, or `~/.config/studyroom-dev/` when
/// `STUDYROOM_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("STUDYROOM_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYROOM_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studyroom-dev")
            } else {
                base_dir.join("studyroom")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Path of the SQLite database inside [`data_dir`].
pub fn database_path() -> Result<PathBuf, ConfigError> {
    Ok(data_dir()?.join("studyroom.db"))
}
