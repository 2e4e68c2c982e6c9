//! Log output for the command-line program.
//!
//! The library only emits `tracing` events; `main` calls [`init`] once to
//! install a subscriber that writes them to stderr.

use chrono::Local;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{format::Writer, time::FormatTime},
    prelude::*,
};

/// Installs the stderr subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to INFO. Calling it again after a
/// subscriber is already installed has no effect.
pub fn init() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_timer(LocalTimer)
                .with_target(false)
                .with_thread_names(true),
        )
        .try_init();
}

// Local wall-clock time to the second, matching the timestamps in the
// result file.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
        tracing::info!("logging initialized");
    }
}
