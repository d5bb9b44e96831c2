//! onthisday daemon for keeping the photo index current.
//!
//! On startup the daemon clears an indexing flag left behind by a process
//! that died mid-scan, runs a lazy scan, and then a differential reindex on
//! every interval. It shares the SQLite database with the `onthisday` CLI;
//! whichever starts a run first owns it and the other is turned away.
//!
//! ## Usage
//!
//! ```bash
//! onthisday-daemon              # Run in foreground
//! onthisday-daemon --once       # One differential pass, then exit
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

use onthisday::{logging, Config, Database, IndexError, Indexer, RunMode};

struct DaemonArgs {
    /// Override of `daemon.reindex_interval_secs`.
    interval: Option<u64>,
    once: bool,
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = parse_args();

    logging::init_daemon()?;

    info!("onthisday daemon starting...");

    let config = Config::load(args.config_path.as_deref())?;
    info!("Config loaded, photo library at {:?}", config.photo_path);

    let db = Database::open(&config.db_path).context("Failed to open database")?;
    db.init_photo_metadata()
        .context("Failed to initialize photo metadata")?;
    info!("Database opened at {:?}", config.db_path);

    let indexer = Indexer::new(Arc::new(db), config.indexer.image_extensions.clone());

    if indexer.reset_indexing_flag_if_stuck()? {
        info!("Recovered from an interrupted indexing run");
    }

    if args.once {
        info!("Running in single-shot mode");
        run_pass(&indexer, &config, RunMode::Differential)?;
    } else {
        let interval = args.interval.unwrap_or(config.daemon.reindex_interval_secs);
        info!("Running in daemon mode, reindexing every {} seconds", interval);
        run_daemon_loop(&indexer, &config, interval);
    }

    info!("onthisday daemon stopped");
    Ok(())
}

fn parse_args() -> DaemonArgs {
    match parse_daemon_args(std::env::args().skip(1)) {
        Ok(Some(daemon_args)) => daemon_args,
        Ok(None) => {
            print_help();
            std::process::exit(0);
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            print_help();
            std::process::exit(1);
        }
    }
}

/// `Ok(None)` means help was requested.
fn parse_daemon_args(args: impl IntoIterator<Item = String>) -> Result<Option<DaemonArgs>, String> {
    let mut daemon_args = DaemonArgs {
        interval: None,
        once: false,
        config_path: None,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" | "-1" => daemon_args.once = true,
            "--interval" | "-i" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{} requires a number of seconds", arg))?;
                let interval = value
                    .parse::<u64>()
                    .ok()
                    .filter(|&secs| secs > 0)
                    .ok_or_else(|| format!("invalid interval {:?}, expected seconds > 0", value))?;
                daemon_args.interval = Some(interval);
            }
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| format!("{} requires a path argument", arg))?;
                daemon_args.config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(Some(daemon_args))
}

fn print_help() {
    println!(
        r#"onthisday-daemon - Background indexer for onthisday

USAGE:
    onthisday-daemon [OPTIONS]

OPTIONS:
    --once, -1          Run one differential reindex and exit
    --interval, -i N    Seconds between reindex passes (default: from config, 86400)
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    ONTHISDAY_CONFIG      Path to config file (overrides default location)
    ONTHISDAY_PHOTO_PATH  Photo library root (overrides config)
    ONTHISDAY_LOG         Log level (trace, debug, info, warn, error)
"#
    );
}

fn run_daemon_loop(indexer: &Indexer, config: &Config, interval: u64) {
    let mut mode = RunMode::Lazy;
    loop {
        if let Err(e) = run_pass(indexer, config, mode) {
            error!("Error during {} indexing: {:#}", mode, e);
        }
        mode = RunMode::Differential;

        thread::sleep(Duration::from_secs(interval.max(1)));
    }
}

/// One indexing run, waited for. A run already owned by another process is
/// not an error; this pass is skipped.
fn run_pass(indexer: &Indexer, config: &Config, mode: RunMode) -> Result<()> {
    let handle = match indexer.start(&config.photo_path, config.indexer.worker_count, mode) {
        Ok(handle) => handle,
        Err(IndexError::AlreadyActive) => {
            warn!("Indexing already active elsewhere, skipping this {} pass", mode);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let summary = handle.wait()?;
    info!(
        "{} pass done: {} found, {} indexed, {} failed, {} removed",
        mode, summary.discovered, summary.indexed, summary.failed, summary.removed
    );
    Ok(())
}
