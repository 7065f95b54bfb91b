use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use libhelicorder::config::{Config, RenderConfig};
use libhelicorder::process::{create_subsets, render_day, render_range};
use libhelicorder::worker_status::{DayOutcome, WorkerStatus};

const EXIT_NO_DATA: u8 = 2;

const LOG_PATH: &str = "./helicorder.log";

/// Send everything to the console and to a log file.
///
/// Returns a logger writing to the file only, for use while progress bars own the terminal.
fn init_logging(log_path: &Path) -> Result<Arc<spdlog::Logger>, spdlog::Error> {
    let file_sink: Arc<dyn spdlog::sink::Sink> = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(log_path)
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()?,
    );
    let mut sinks = spdlog::default_logger().sinks().to_vec();
    sinks.push(file_sink.clone());
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sinks(sinks)
            .build()?,
    );
    spdlog::set_default_logger(logger);

    Ok(Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    ))
}

fn parse_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
}

fn make_template_config(path: &Path) -> ExitCode {
    spdlog::info!(
        "Making a template config at {}...",
        path.to_string_lossy()
    );
    match Config::default().write_config_file(path) {
        Ok(()) => {
            spdlog::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            spdlog::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_single(config: &RenderConfig, day: Date) -> ExitCode {
    match render_day(config, day) {
        Ok(path) => {
            spdlog::info!("Helicorder complete: {}", path.to_string_lossy());
            ExitCode::SUCCESS
        }
        Err(e) if e.is_no_data() => {
            spdlog::error!("{e}. Exiting.");
            ExitCode::from(EXIT_NO_DATA)
        }
        Err(e) => {
            spdlog::error!("Rendering failed with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_range(
    config: RenderConfig,
    first: Date,
    last: Date,
    file_logger: Option<Arc<spdlog::Logger>>,
) -> ExitCode {
    let n_workers = create_subsets(first, last, config.n_threads)
        .iter()
        .filter(|subset| !subset.is_empty())
        .count();
    let style = ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let pb_manager = MultiProgress::new();
    let bars: Vec<ProgressBar> = (0..n_workers)
        .map(|idx| {
            let bar = pb_manager.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(format!("Worker {idx}"));
            bar
        })
        .collect();

    // Console output would tear the bars, so only the log file hears from the workers
    let console_logger = file_logger.map(spdlog::swap_default_logger);

    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || render_range(&config, first, last, tx));

    let mut n_no_data = 0;
    for status in rx.iter() {
        if status.outcome == DayOutcome::NoData {
            n_no_data += 1;
        }
        if let Some(bar) = bars.get(status.worker_id) {
            bar.set_position((status.progress * 100.0) as u64);
            bar.set_message(status.day.to_string());
        }
    }
    for bar in bars.iter() {
        bar.finish();
    }
    if let Some(logger) = console_logger {
        spdlog::set_default_logger(logger);
    }

    match handle.join() {
        Ok(Ok(written)) => {
            spdlog::info!(
                "Rendered {} helicorder(s); {} day(s) had no data.",
                written.len(),
                n_no_data
            );
            if written.is_empty() && n_no_data > 0 {
                ExitCode::from(EXIT_NO_DATA)
            } else {
                ExitCode::SUCCESS
            }
        }
        Ok(Err(e)) => {
            spdlog::error!("Rendering failed with error: {e}");
            ExitCode::FAILURE
        }
        Err(_) => {
            spdlog::error!("Failed to join rendering task!");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("helicorder_cli")
        .about("Render seismic helicorder drum plots from a miniSEED archive")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("date")
                .short('d')
                .long("date")
                .help("Day to render as YYYY-MM-DD (default: today, UTC)"),
        )
        .arg(
            Arg::new("end-date")
                .short('e')
                .long("end-date")
                .help("Render every day from --date up to and including this one"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(clap::value_parser!(usize))
                .help("Number of worker threads for a date range (overrides the config)"),
        )
        .get_matches();

    // Initialize feedback
    let file_logger = match init_logging(Path::new(LOG_PATH)) {
        Ok(logger) => Some(logger),
        Err(e) => {
            eprintln!("Could not create the log file, logging to the console only: {e}");
            None
        }
    };

    // Parse the cli
    let config_path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => {
            spdlog::error!("A configuration path is required");
            return ExitCode::FAILURE;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        return make_template_config(&config_path);
    }

    let first = match matches.get_one::<String>("date") {
        Some(value) => match parse_date(value) {
            Ok(day) => day,
            Err(e) => {
                spdlog::error!("Invalid date {value:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => OffsetDateTime::now_utc().date(),
    };
    let last = match matches.get_one::<String>("end-date") {
        Some(value) => match parse_date(value) {
            Ok(day) => Some(day),
            Err(e) => {
                spdlog::error!("Invalid end date {value:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let mut config = match Config::read_config_file(&config_path).and_then(|c| c.validate()) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(n_threads) = matches.get_one::<usize>("threads") {
        config.n_threads = (*n_threads).max(1);
    }
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Archive Path: {}", config.archive.to_string_lossy());
    spdlog::info!("Products Path: {}", config.products.to_string_lossy());
    spdlog::info!(
        "Site: {}.{}.{}.{} Component: {}",
        config.site.network,
        config.site.station,
        config.site.location,
        config.site.channels,
        config.component
    );
    spdlog::info!("Interval: {} minutes Filters: {}", config.interval, config.filter_description());

    match last {
        None => run_single(&config, first),
        Some(last) if last < first => {
            spdlog::error!("End date {last} is before start date {first}");
            ExitCode::FAILURE
        }
        Some(last) => run_range(config, first, last, file_logger),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logger_keeps_the_console_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("helicorder.log");
        let n_console_sinks = spdlog::default_logger().sinks().len();

        let file_logger = init_logging(&log_path).unwrap();
        assert_eq!(file_logger.sinks().len(), 1);
        assert_eq!(spdlog::default_logger().sinks().len(), n_console_sinks + 1);

        let console_logger = spdlog::swap_default_logger(file_logger);
        spdlog::info!("while the bars are live");
        spdlog::set_default_logger(console_logger);
        assert_eq!(spdlog::default_logger().sinks().len(), n_console_sinks + 1);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("while the bars are live"));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-03-10").unwrap(),
            time::macros::date!(2024 - 03 - 10)
        );
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("10/03/2024").is_err());
    }
}
