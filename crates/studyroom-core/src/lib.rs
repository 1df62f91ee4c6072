//! # Studyroom Core Library
//!
//! This library provides the core logic for the Studyroom study companion.
//! It follows a CLI-first design: every operation is a plain function or
//! method here, and the `studyroom` binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Schedule**: weekly study sessions with `HH:mm` bounds
//! - **Alerts**: a poll-driven engine that turns session boundaries into
//!   notifications exactly once
//! - **Timer Engine**: a wall-clock-based Pomodoro state machine that requires
//!   the caller to periodically invoke `tick()` for progress updates
//! - **Storage**: SQLite persistence and TOML-based configuration
//! - **Tutor**: a Gemini chat and text-to-speech client
//!
//! ## Key Components
//!
//! - [`Schedule`]: Sessions and weekly queries
//! - [`AlertEngine`]: Session reminders with catch-up after missed polls
//! - [`Dispatcher`]: Notifier chain with fallbacks
//! - [`TimerEngine`]: Core timer state machine
//! - [`Database`] / [`ScheduleDb`]: Persistence
//! - [`Config`]: Application configuration management

pub mod alerts;
pub mod credentials;
pub mod error;
pub mod events;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod timer;
pub mod tutor;

pub use alerts::{Alert, AlertEngine, AlertKind, AlertSettings};
pub use error::{ConfigError, CoreError, DatabaseError, TutorError, ValidationError};
pub use events::Event;
pub use notify::{Dispatcher, Notice, NoticeKind, Notifier};
pub use schedule::{ClockTime, Schedule, Session, SessionPatch};
pub use storage::{Config, Database, ScheduleDb};
pub use timer::{Cycle, Phase, Step, TimerEngine, TimerState};
pub use tutor::{GeminiClient, Tutor};
