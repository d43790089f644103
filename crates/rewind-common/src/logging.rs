//! Unified logging setup for rewind
//!
//! Library crates only emit `tracing` events. Binaries call [`init`] once at
//! startup to install a stderr subscriber with:
//! - Minimum log level configuration (or `RUST_LOG` when present)
//! - Optional target/thread/source annotations for debugging
//! - Error cause-chain formatting via [`format_error`]

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Log levels accepted on the command line and in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::parse(s).ok_or_else(|| LoggingError::InvalidLevel(s.to_string()))
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Logging configuration options
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Minimum log level (defaults to INFO)
    pub level: Option<LogLevel>,
    /// Annotate records with target, thread id, file and line
    pub debug: bool,
    /// Let `RUST_LOG` override `level` when it is set
    pub respect_env: bool,
}

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initialize the global `tracing` subscriber
///
/// Fails with [`LoggingError::AlreadyInitialized`] when a subscriber was
/// installed earlier in the process (tests commonly hit this).
pub fn init(options: LogOptions) -> Result<(), LoggingError> {
    let level = options.level.unwrap_or_default();

    let filter = if options.respect_env {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
    } else {
        EnvFilter::new(level.as_str().to_lowercase())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.debug)
        .with_thread_ids(options.debug)
        .with_file(options.debug)
        .with_line_number(options.debug)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(level = level.as_str(), "Logging initialized");
    Ok(())
}

/// Format an error with its cause chain
pub fn format_error(error: &dyn std::error::Error) -> String {
    format_error_recursive(error, 0)
}

fn format_error_recursive(error: &dyn std::error::Error, depth: usize) -> String {
    const MAX_DEPTH: usize = 10;

    if depth >= MAX_DEPTH {
        return error.to_string();
    }

    let base = error.to_string();

    if let Some(source) = error.source() {
        format!("{} Caused by: {}", base, format_error_recursive(source, depth + 1))
    } else {
        base
    }
}
