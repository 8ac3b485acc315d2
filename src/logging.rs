//! Tracing subscriber setup shared by the binaries.
//!
//! stdout carries the JSON response of the prediction binary, so logs never go
//! there: they go to stderr, or to a file with `CARDIORISK_LOG_MODE=file`.

use std::fs::OpenOptions;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogMode;

/// Install the global subscriber.
///
/// The filter defaults to `info` and honours `RUST_LOG`. Keep the returned
/// guard alive for the life of the process or buffered lines are lost.
///
/// # Errors
/// Returns an error if the log file cannot be opened.
pub fn init(mode: &LogMode) -> io::Result<WorkerGuard> {
    let (writer, guard) = match mode {
        LogMode::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                // Best-effort: opening the file reports the real error.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(io::stderr()),
    };

    let ansi = matches!(mode, LogMode::Stderr);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi),
        )
        .init();

    Ok(guard)
}
