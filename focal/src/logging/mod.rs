//! Structured logging infrastructure for Focal.
//!
//! Logging is built on `tracing`. [`init`] installs a global `fmt`
//! subscriber in one of four formats, writing to stdout, a non-blocking file
//! or both. `RUST_LOG` overrides the configured level when set.


use crate::config::{LogFormat, LogLevel, LoggingConfig};
use std::path::Path;
use std::sync::OnceLock;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Keeps the file writer's worker alive for the life of the process
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Error type for logging operations
#[derive(Debug)]
pub enum LogError {
    /// IO error occurred
    IoError(std::io::Error),

    /// Error parsing log level
    InvalidLogLevel(String),

    /// Error in subscriber setup
    SubscriberError(Box<dyn std::error::Error + Send + Sync>),

    /// General error
    Other(String),
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::IoError(err)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for LogError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        LogError::SubscriberError(err)
    }
}

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, LogError>;

/// Initialize the logging system with the given configuration.
///
/// Calling this when a global subscriber is already installed is a no-op.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let (writer, guard) = make_writer(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config.level))
        .with_writer(writer)
        .with_ansi(config.file.is_none())
        .with_level(true)
        .with_target(true)
        .with_line_number(true)
        .with_thread_ids(true);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Default => builder.try_init(),
    };

    match result {
        Ok(()) => {
            if let Some(guard) = guard {
                let _ = FILE_GUARD.set(guard);
            }
            tracing::debug!(level = %config.level, "logging initialized");
            Ok(())
        }
        // lost a race with another initializer
        Err(_) if tracing::dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(LogError::SubscriberError(e)),
    }
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Resolve the configured outputs into a single writer.
fn make_writer(config: &LoggingConfig) -> Result<(BoxMakeWriter, Option<WorkerGuard>)> {
    match (&config.file, config.stdout) {
        (Some(path), true) => {
            let (file, guard) = create_non_blocking_file(path)?;
            Ok((BoxMakeWriter::new(std::io::stdout.and(file)), Some(guard)))
        }
        (Some(path), false) => {
            let (file, guard) = create_non_blocking_file(path)?;
            Ok((BoxMakeWriter::new(file), Some(guard)))
        }
        (None, true) => Ok((BoxMakeWriter::new(std::io::stdout), None)),
        (None, false) => Err(LogError::Other(
            "no log output configured: enable stdout or set a file".to_string(),
        )),
    }
}

/// Create a non-blocking file writer.
fn create_non_blocking_file(path: impl AsRef<Path>) -> Result<(NonBlocking, WorkerGuard)> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| LogError::Other(format!("not a file path: {}", path.display())))?;

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !directory.exists() {
        std::fs::create_dir_all(directory)?;
    }

    let file_appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Parse a log level string into a LogLevel enum.
pub fn parse_log_level(level: &str) -> Result<LogLevel> {
    level
        .parse()
        .map_err(|_| LogError::InvalidLogLevel(level.to_string()))
}

/// Convert a tracing::Level to a LogLevel enum.
pub fn level_to_log_level(level: Level) -> LogLevel {
    match level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

/// Convert a LogLevel into the matching tracing::Level.
pub fn log_level_to_level(level: LogLevel) -> Level {
    match level {
        LogLevel::Trace => Level::TRACE,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Info => Level::INFO,
        LogLevel::Warn => Level::WARN,
        LogLevel::Error => Level::ERROR,
    }
}

impl std::fmt::Display for LogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogError::IoError(e) => write!(f, "IO error: {}", e),
            LogError::SubscriberError(e) => write!(f, "Subscriber error: {}", e),
            LogError::InvalidLogLevel(s) => write!(f, "Invalid log level: {}", s),
            LogError::Other(s) => write!(f, "{}", s),
        }
    }
}

impl std::error::Error for LogError {}
