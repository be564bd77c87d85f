//! Diagnostic logging for the reporter itself.
//!
//! Failure reports go to the console or the response body; the reporter's own
//! diagnostics (captures, throttling, renderer fallbacks) go through `tracing`
//! to stderr so the two never interleave. `RUST_LOG` overrides the configured
//! level.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

/// Log level configuration for the diagnostic logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level - includes suppressed events
    Trace,
    /// Debug level - every capture
    Debug,
    /// Info level
    Info,
    /// Warning level (default) - renderer fallbacks
    #[default]
    Warn,
    /// Error level - fatal terminations only
    Error,
    /// Disable logging entirely
    Off,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl From<u8> for LogLevel {
    /// Convert verbosity count to log level.
    /// 0 = Warn, 1 = Info, 2 = Debug, 3+ = Trace
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Configuration for the diagnostic logger.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include the target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            with_timestamps: true,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Set whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Create a configuration from a `-v` count.
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self::default().with_level(LogLevel::from(verbosity))
    }

    fn env_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.level.directive())
        }
    }
}

/// Install the global stderr subscriber.
///
/// Returns `false` if a subscriber was already installed, which is harmless:
/// the existing one keeps receiving the reporter's events.
///
/// # Examples
///
/// ```no_run
/// use faultline::logging::{init_logging, LogLevel, LoggingConfig};
///
/// init_logging(LoggingConfig::new().with_level(LogLevel::Debug));
/// ```
pub fn init_logging(config: LoggingConfig) -> bool {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let result = if config.with_timestamps {
        subscriber.try_init()
    } else {
        subscriber.without_time().try_init()
    };
    result.is_ok()
}
