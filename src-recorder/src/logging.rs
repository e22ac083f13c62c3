//! Tracing subscriber setup: a daily rolling file plus stderr.

use reelcap_common::logging::{ensure_log_dir, LOG_FILE_BASENAME};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_RETENTION_DAYS: u64 = 7;

/// Install the global subscriber.
///
/// The file receives everything `RUST_LOG` allows (default `info`); stderr
/// only shows warnings and errors unless `verbose` is set. Keep the returned
/// guard alive for the lifetime of the process or buffered lines are lost.
pub fn init_logging(verbose: bool) -> Result<WorkerGuard, std::io::Error> {
    let log_dir = ensure_log_dir()?;

    prune_old_logs(
        &log_dir,
        Duration::from_secs(60 * 60 * 24 * LOG_RETENTION_DAYS),
    );

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_BASENAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let stderr_level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::WARN
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    Ok(guard)
}

/// Delete rolled log files older than `max_age`.
pub fn prune_old_logs(log_dir: &Path, max_age: Duration) {
    let Ok(entries) = std::fs::read_dir(log_dir) else {
        return;
    };

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };

        if !file_name.starts_with(LOG_FILE_BASENAME) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };

        if modified < cutoff {
            let _ = std::fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prune_keeps_fresh_and_foreign_files() {
        let dir = std::env::temp_dir().join(format!("reelcap-logs-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let ours = dir.join(format!("{}.2020-01-01", LOG_FILE_BASENAME));
        let foreign = dir.join("other.log");
        std::fs::write(&ours, "x").unwrap();
        std::fs::write(&foreign, "x").unwrap();

        // Nothing is older than a day yet
        prune_old_logs(&dir, Duration::from_secs(86_400));
        assert!(ours.exists());

        // Everything is older than zero seconds
        std::thread::sleep(Duration::from_millis(20));
        prune_old_logs(&dir, Duration::from_millis(1));
        assert!(!ours.exists());
        assert!(foreign.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
