use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use onthisday::{
    format_duration, logging, Config, Database, Indexer, PhotoQuery, RunMode, StatusReporter,
    StuckRunDetector,
};

enum Command {
    Init,
    Index { mode: RunMode, quiet: bool },
    Status { watch: bool },
    Today { limit: Option<usize> },
    Memories { years: u32, limit: Option<usize> },
    Random { count: Option<usize> },
    Info { path: PathBuf },
    Hashing { enable: Option<bool> },
}

struct Cli {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path = None;
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("onthisday {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    usage_error("--config requires a path argument");
                }
            }
            _ => rest.push(args[i].as_str()),
        }
        i += 1;
    }

    let command = match rest.as_slice() {
        [] | ["status"] => Command::Status { watch: false },
        ["status", "--watch" | "-w"] => Command::Status { watch: true },
        ["init"] => Command::Init,
        ["index", options @ ..] => parse_index(options),
        ["today"] => Command::Today { limit: None },
        ["today", limit] => Command::Today {
            limit: Some(parse_number(limit, "LIMIT")),
        },
        ["memories"] => Command::Memories { years: 1, limit: None },
        ["memories", years] => Command::Memories {
            years: parse_number(years, "YEARS"),
            limit: None,
        },
        ["memories", years, limit] => Command::Memories {
            years: parse_number(years, "YEARS"),
            limit: Some(parse_number(limit, "LIMIT")),
        },
        ["random"] => Command::Random { count: None },
        ["random", count] => Command::Random {
            count: Some(parse_number(count, "N")),
        },
        ["info", path] => Command::Info {
            path: PathBuf::from(path),
        },
        ["hashing"] => Command::Hashing { enable: None },
        ["hashing", "on"] => Command::Hashing { enable: Some(true) },
        ["hashing", "off"] => Command::Hashing { enable: Some(false) },
        _ => usage_error(&format!("Unknown command: {}", rest.join(" "))),
    };

    Cli {
        config_path,
        command,
    }
}

fn parse_index(options: &[&str]) -> Command {
    let mut mode = RunMode::Lazy;
    let mut quiet = false;
    for option in options {
        match *option {
            "lazy" => mode = RunMode::Lazy,
            "full" => mode = RunMode::Full,
            "diff" | "differential" => mode = RunMode::Differential,
            "--quiet" | "-q" => quiet = true,
            other => usage_error(&format!("Unknown index option: {}", other)),
        }
    }
    Command::Index { mode, quiet }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> T {
    value
        .parse()
        .unwrap_or_else(|_| usage_error(&format!("{} must be a non-negative number", name)))
}

fn usage_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"onthisday - photo library indexer for "on this day" memories

USAGE:
    onthisday [OPTIONS] [COMMAND]

COMMANDS:
    init                        Create config and database
    index [full|diff|lazy]      Index the library (default: lazy)
          [--quiet, -q]         Don't print progress while indexing
    status [--watch, -w]        Show indexing progress (default command)
    today [LIMIT]               Photos taken on this day in any year
    memories [YEARS] [LIMIT]    Photos taken on this day YEARS ago (default: 1)
    random [N]                  N random photos from the index (1-10)
    info PATH                   Show the stored record of one photo
    hashing [on|off]            Show or toggle MD5 hashing of indexed files

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    ONTHISDAY_CONFIG      Path to config file (overrides default location)
    ONTHISDAY_PHOTO_PATH  Photo library root (overrides config)
    ONTHISDAY_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/onthisday/config.toml

See also: onthisday-daemon --help"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    let _ = logging::init(None);

    let config = Config::load(cli.config_path.as_deref())?;

    let db = Database::open(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    db.init_photo_metadata()?;
    let db = Arc::new(db);

    match cli.command {
        Command::Init => {
            println!("Config:   {}", cli.config_path.unwrap_or_else(Config::config_path).display());
            println!("Database: {}", config.db_path.display());
            println!("Library:  {}", config.photo_path.display());
        }
        Command::Index { mode, quiet } => run_index(&config, db, mode, quiet)?,
        Command::Status { watch } => show_status(&config, db, watch)?,
        Command::Today { limit } => {
            let limit = limit.unwrap_or(config.memories.photo_count);
            let photos = PhotoQuery::new(db).photos_from_this_day(limit)?;
            print_photos(&photos, &format!("on {}", Local::now().format("%B %-d")));
        }
        Command::Memories { years, limit } => {
            let limit = limit.unwrap_or(config.memories.photo_count);
            let photos = PhotoQuery::new(db).photos_from_past(years, limit)?;
            let label = if years == 1 {
                "1 year ago today".to_string()
            } else {
                format!("{} years ago today", years)
            };
            print_photos(&photos, &label);
        }
        Command::Random { count } => {
            let count = count.unwrap_or(config.memories.photo_count);
            let photos = PhotoQuery::new(db).random_photos(count)?;
            print_photos(&photos, "your library");
        }
        Command::Info { path } => show_info(db, &path)?,
        Command::Hashing { enable } => {
            let indexer = Indexer::new(db, config.indexer.image_extensions.clone());
            if let Some(enable) = enable {
                indexer.enable_file_hashing(enable)?;
            }
            let state = if indexer.is_file_hashing_enabled()? { "on" } else { "off" };
            println!("File hashing: {}", state);
        }
    }

    Ok(())
}

fn run_index(config: &Config, db: Arc<Database>, mode: RunMode, quiet: bool) -> Result<()> {
    let indexer = Indexer::new(Arc::clone(&db), config.indexer.image_extensions.clone());
    let handle = indexer.start(&config.photo_path, config.indexer.worker_count, mode)?;
    println!("Started {} indexing of {}", mode, config.photo_path.display());

    if !quiet {
        let reporter = StatusReporter::new(
            db,
            &config.photo_path,
            config.indexer.image_extensions.clone(),
        );
        let poll = Duration::from_secs(config.daemon.status_poll_secs.max(1));
        while !handle.is_finished() {
            thread::sleep(poll);
            let status = reporter.indexing_status()?;
            if status.active {
                println!("Indexed {}/{} photos", status.indexed_count, status.total_count);
            }
        }
    }

    let summary = handle.wait()?;
    println!(
        "Done: {} found, {} indexed, {} unchanged, {} failed, {} removed",
        summary.discovered, summary.indexed, summary.skipped, summary.failed, summary.removed
    );
    Ok(())
}

fn show_status(config: &Config, db: Arc<Database>, watch: bool) -> Result<()> {
    let reporter = StatusReporter::new(
        Arc::clone(&db),
        &config.photo_path,
        config.indexer.image_extensions.clone(),
    );

    print_status(&reporter)?;
    if !watch {
        return Ok(());
    }

    let indexer = Indexer::new(db, config.indexer.image_extensions.clone());
    let mut detector = StuckRunDetector::new(config.daemon.stuck_after_polls);
    let poll = Duration::from_secs(config.daemon.status_poll_secs.max(1));
    loop {
        let status = reporter.indexing_status()?;
        if !status.active {
            break;
        }
        if detector.observe(&status) {
            println!(
                "No progress after {} checks, resetting the indexing flag",
                config.daemon.stuck_after_polls
            );
            indexer.reset_indexing_flag_if_stuck()?;
            break;
        }
        thread::sleep(poll);
        println!("Indexed {}/{} photos", status.indexed_count, status.total_count);
    }

    print_status(&reporter)
}

fn print_status(reporter: &StatusReporter) -> Result<()> {
    let status = reporter.indexing_status()?;
    let state = if status.active { "running" } else { "idle" };
    println!("Indexing: {}", state);
    println!("Photos:   {}/{}", status.indexed_count, status.total_count);

    match reporter.last_indexed_time()? {
        Some(time) => println!(
            "Last run: {}",
            time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Last run: never"),
    }
    if let Some(seconds) = reporter.indexing_duration()? {
        println!("Duration: {}", format_duration(seconds));
    }
    Ok(())
}

fn print_photos(photos: &[PathBuf], label: &str) {
    if photos.is_empty() {
        println!("No photos from {}", label);
        return;
    }
    println!("Photos from {}:", label);
    for photo in photos {
        println!("  {}", photo.display());
    }
}

fn show_info(db: Arc<Database>, path: &Path) -> Result<()> {
    let Some(info) = PhotoQuery::new(db).photo_info(path)? else {
        println!("{} is not indexed", path.display());
        return Ok(());
    };

    println!("Path:     {}", info.path);
    println!("Taken:    {}", info.taken_date.format("%Y-%m-%d %H:%M:%S"));
    if !info.camera_model.is_empty() {
        println!("Camera:   {}", info.camera_model);
    }
    if info.has_gps() {
        println!("GPS:      {:.6}, {:.6}", info.gps_lat, info.gps_lon);
    }
    println!("Size:     {} bytes", info.file_size);
    if let Some(hash) = &info.file_hash {
        println!("MD5:      {}", hash);
    }
    println!(
        "Indexed:  {}",
        info.indexed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}
