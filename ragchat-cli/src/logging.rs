//! Tracing subscriber setup.
//!
//! Events go to stderr, filtered by `RUST_LOG` (default `info`). With a log
//! directory, every run also writes `<dir>/<YYYY-MM-DD_HH-MM-SS>.log` without
//! ANSI colours.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name of the log written by a run started at `now`.
pub fn log_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// whole program.
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer =
        tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry().with(env_filter).with(stderr_layer).try_init()?;
        return Ok(None);
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_name = log_file_name(chrono::Local::now());
    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    let path: PathBuf = log_dir.join(file_name);
    tracing::info!(path = %path.display(), "logging to file");
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn log_file_is_named_after_start_time() {
        let now = chrono::Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(now), "2024-03-09_07-05-01.log");
    }
}
