pub mod auth;
pub mod config;
pub mod schedule;
pub mod stats;
pub mod timer;
pub mod tutor;
pub mod watch;

/// Runtime for the commands that talk to the network or wait on timers.
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
