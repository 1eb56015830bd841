//! Logging for the notes-ai binary.
//!
//! Every command prints its result as JSON on stdout, so log lines go to
//! stderr (colored) and to `notes-ai.log` in the log directory. Retries,
//! pacing waits and reconnects from `ai-client` show up here, which is where
//! to look when a summary took longer than expected.

use crate::error::AppError;

use common::ErrorLocation;

use std::fmt::{Arguments, Display};
use std::io::stderr;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, Record, info, warn};

/// fern can install the global logger only once per process.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Set on the first call, successful or not; unit tests call `initialize` too.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "notes-ai.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install the stderr + file logger for a CLI run.
///
/// Called by `main` before config or credentials are loaded, so failures there
/// are already logged. Later calls log a warning and return Ok. `--verbose`
/// raises release builds to `Debug`, which includes each retry decision and
/// cache lookup.
///
/// # Errors
///
/// Returns [`AppError::App`] if the log file cannot be created or the global
/// logger cannot be installed.
pub fn initialize(log_dir: &Path, verbose: bool) -> Result<(), AppError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let level = if verbose {
        LevelFilter::Debug
    } else {
        DEFAULT_LOG_LEVEL
    };

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir, level);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{level:?}");
        }
    });

    result
}

#[track_caller]
pub(crate) fn initialize_internal(log_dir: &Path, level: LevelFilter) -> Result<(), AppError> {
    let log_file_path = log_dir.join(LOG_FILE_NAME);

    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    // HTTP and WebSocket internals drown out retry and cache lines at debug
    let base_dispatch = Dispatch::new()
        .level(level)
        .level_for("hyper_util", LevelFilter::Info)
        .level_for("rustls", LevelFilter::Info)
        .level_for("tungstenite", LevelFilter::Info);

    let log_file = fern::log_file(&log_file_path).map_err(|e| AppError::App {
        message: format!("Failed to create log file: {e}"),
        location: ErrorLocation::from(std::panic::Location::caller()),
    })?;

    let stderr_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            let level = color_configuration.color(record.level());
            out.finish(format_args!("{}", record_line(message, record, level)))
        })
        .chain(stderr());

    let file_dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", record_line(message, record, record.level())))
        })
        .chain(log_file);

    base_dispatch
        .chain(stderr_dispatch)
        .chain(file_dispatch)
        .apply()
        .map_err(|e| AppError::App {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(std::panic::Location::caller()),
        })?;

    Ok(())
}

/// `[<rfc3339> - <level>] <message> [<file>:<line>]`
fn record_line(message: &Arguments<'_>, record: &Record<'_>, level: impl Display) -> String {
    format!(
        "[{} - {level}] {message} [{}:{}]",
        format_rfc3339(SystemTime::now()),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
    )
}
