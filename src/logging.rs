//! Logging configuration with journald support on Linux.
//!
//! Logs go to systemd's journal when it is reachable. Otherwise the CLI logs
//! to a daily-rolling file under the local data directory and the daemon logs
//! to stderr, where a service manager picks it up.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `ONTHISDAY_LOG=debug`.
pub const LOG_ENV: &str = "ONTHISDAY_LOG";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the journald subscriber. Returns `false` when the journal is
/// unreachable or the platform has none.
fn try_init_journald() -> Result<bool> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(journald_layer)
                .try_init()
                .context("Failed to set tracing subscriber")?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Initialize logging for interactive use: journald, else a log file in
/// `log_dir` (default `$XDG_DATA_HOME/onthisday/logs`).
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    if try_init_journald()? {
        return Ok(());
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "onthisday.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes on drop, so it must live for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .context("Failed to set tracing subscriber")?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

/// Initialize logging for the daemon: journald, else stderr.
pub fn init_daemon() -> Result<()> {
    if try_init_journald()? {
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("onthisday")
        .join("logs")
}
