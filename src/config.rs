//! Reporter configuration.
//!
//! Settings live under an `[errors]` table in a TOML file and can be
//! overridden from the environment. The output filter is a closure and can
//! only be set programmatically.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::output::OutputFilter;
use crate::render::{ERROR_VIEW, FATAL_VIEW};
use crate::throttle::{DEFAULT_THRESHOLD, REPORT_ALL};

/// Prefix of environment overrides, e.g. `FAULTLINE__ERRORS__THROTTLING=3`.
pub const ENV_PREFIX: &str = "FAULTLINE";

/// Options consumed by the error reporter.
#[derive(Clone, Deserialize)]
pub struct ReporterConfig {
    /// Number of runtime events reported individually before throttling
    #[serde(default = "default_throttling")]
    pub throttling: u64,
    /// Fatal severity codes that should be handled as recoverable
    #[serde(default)]
    pub continue_on: BTreeSet<i64>,
    /// Template id of the fatal report page
    #[serde(default = "default_view_fatal")]
    pub view_fatal: String,
    /// Template id of the inline non-fatal report
    #[serde(default = "default_view_error")]
    pub view_error: String,
    /// Bitmask of enabled severities (-1 enables all)
    #[serde(default = "default_reporting")]
    pub reporting: i64,
    /// Filter applied to the buffer opened for a fatal report
    #[serde(skip)]
    pub output_filter: Option<OutputFilter>,
}

fn default_throttling() -> u64 {
    DEFAULT_THRESHOLD
}

fn default_view_fatal() -> String {
    FATAL_VIEW.to_string()
}

fn default_view_error() -> String {
    ERROR_VIEW.to_string()
}

fn default_reporting() -> i64 {
    REPORT_ALL
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            throttling: default_throttling(),
            continue_on: BTreeSet::new(),
            view_fatal: default_view_fatal(),
            view_error: default_view_error(),
            reporting: default_reporting(),
            output_filter: None,
        }
    }
}

impl fmt::Debug for ReporterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterConfig")
            .field("throttling", &self.throttling)
            .field("continue_on", &self.continue_on)
            .field("view_fatal", &self.view_fatal)
            .field("view_error", &self.view_error)
            .field("reporting", &self.reporting)
            .field("output_filter", &self.output_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Errors that can occur when loading reporter configuration.
#[derive(Debug, Error)]
pub enum ReporterConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    errors: ReporterConfig,
}

impl ReporterConfig {
    /// Load configuration from a TOML file with environment overrides.
    ///
    /// Environment variables use the form `FAULTLINE__ERRORS__<KEY>`, for
    /// example `FAULTLINE__ERRORS__THROTTLING=25`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the path is not valid
    /// UTF-8, or the contents cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReporterConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ReporterConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ReporterConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::with_name(path_str))
            .add_source(Self::environment())
            .build()?;

        let file: ConfigFile = config.try_deserialize()?;
        Ok(file.errors)
    }

    /// Load configuration from environment overrides alone.
    pub fn from_env() -> Result<Self, ReporterConfigError> {
        let config = Config::builder().add_source(Self::environment()).build()?;
        let file: ConfigFile = config.try_deserialize()?;
        Ok(file.errors)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Set the throttling threshold.
    pub fn with_throttling(mut self, threshold: u64) -> Self {
        self.throttling = threshold;
        self
    }

    /// Add codes to the continue-on allow-list.
    pub fn with_continue_on(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.continue_on.extend(codes);
        self
    }

    /// Set the fatal and non-fatal template ids.
    pub fn with_views(mut self, fatal: impl Into<String>, error: impl Into<String>) -> Self {
        self.view_fatal = fatal.into();
        self.view_error = error.into();
        self
    }

    /// Set the reporting mask.
    pub fn with_reporting_mask(mut self, mask: i64) -> Self {
        self.reporting = mask;
        self
    }

    /// Set the filter applied to the buffer opened for a fatal report.
    pub fn with_output_filter(mut self, filter: OutputFilter) -> Self {
        self.output_filter = Some(filter);
        self
    }
}
