/// Structured logging for the groundwater refresh service
///
/// Provides context-rich logging tagged with the data source and, where
/// relevant, the station or district involved. Events are emitted through
/// `tracing`; `init_logger` installs a `tracing_subscriber` formatter that
/// writes to stderr or appends to a log file for daemon operation.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::model::GwError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = GwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(GwError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// India-WRIS groundwater dataset
    Wris,
    /// OpenWeather rainfall forecast
    Weather,
    /// Gemini crop recommendations
    Llm,
    Database,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Wris => write!(f, "WRIS"),
            DataSource::Weather => write!(f, "WEATHER"),
            DataSource::Llm => write!(f, "LLM"),
            DataSource::Database => write!(f, "DB"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Bad caller input or a station with no data yet
    Expected,
    /// Upstream outage, schema drift or misconfiguration
    Unexpected,
    /// Could be either; logged as a warning
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level` when set. With a log file
/// the output is appended there without ANSI colours; otherwise it goes to
/// stderr so that stdout stays reserved for JSON responses.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), GwError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| GwError::Config(format!("cannot open log file {}: {}", path, e)))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None if console_timestamps => builder.with_writer(std::io::stderr).try_init(),
        None => builder.without_time().with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| GwError::Config(format!("logger already initialised: {}", e)))
}

// ---------------------------------------------------------------------------
// Event emitters
// ---------------------------------------------------------------------------

// Every event carries `source` and `station` fields ("-" when not about a
// particular station or district).
macro_rules! emitter {
    ($name:ident, $level:ident) => {
        pub fn $name(source: DataSource, station: Option<&str>, message: &str) {
            tracing::$level!(source = %source, station = station.unwrap_or("-"), "{}", message);
        }
    };
}

emitter!(info, info);
emitter!(warn, warn);
emitter!(error, error);
emitter!(debug, debug);

// ---------------------------------------------------------------------------
// Classifying errors
// ---------------------------------------------------------------------------

/// Classify a failure by its error variant.
pub fn classify_failure(err: &GwError) -> FailureType {
    match err {
        // 404 from the dataset usually means the district name is not
        // recognised for the requested window, not an outage.
        GwError::Http(404) => FailureType::Unknown,
        GwError::Http(_) | GwError::Request(_) => FailureType::Unexpected,
        // Shape changes point at an API revision.
        GwError::Parse(_) => FailureType::Unexpected,
        GwError::Database(_) | GwError::Config(_) => FailureType::Unexpected,
        GwError::MissingInput(_) | GwError::StationNotFound(_) => FailureType::Expected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a data source failure with automatic classification.
///
/// `subject` is the station code or district the operation was about.
pub fn log_failure(source: DataSource, subject: &str, operation: &str, err: &GwError) {
    let failure_type = classify_failure(err);

    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(source, Some(subject), &message),
        FailureType::Unexpected => error(source, Some(subject), &message),
        FailureType::Unknown => warn(source, Some(subject), &message),
    }
}

// ---------------------------------------------------------------------------
// Refresh Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a refresh run
pub fn log_refresh_summary(source: DataSource, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Refresh complete: {}/{} districts successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(source, None, &message);
    } else if successful == 0 {
        error(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}
