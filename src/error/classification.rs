//! Severity classification for captured failures.
//!
//! This module owns the static severity table: it turns raw severity codes into
//! human-readable labels and decides whether a failure must stop execution.
//! Operators can downgrade specific fatal codes through a continue-on allow-list.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Severity codes understood by the classification table.
///
/// The codes are bit flags so that a reporting mask can enable or disable any
/// combination of them. Code `0` is what exceptions carry when they do not set
/// an explicit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i64)]
pub enum Severity {
    /// No explicit code; reported as a plain error.
    Unspecified = 0,
    /// Unrecoverable runtime error.
    Error = 1,
    /// Runtime warning.
    Warning = 2,
    /// Parse failure.
    Parse = 4,
    /// Runtime notice.
    Notice = 8,
    /// Error raised while the runtime starts up.
    CoreError = 16,
    /// Warning raised while the runtime starts up.
    CoreWarning = 32,
    /// Error raised while compiling.
    CompileError = 64,
    /// Warning raised while compiling.
    CompileWarning = 128,
    /// Error raised by application code.
    UserError = 256,
    /// Warning raised by application code.
    UserWarning = 512,
    /// Notice raised by application code.
    UserNotice = 1024,
    /// Strictness suggestion.
    Strict = 2048,
}

impl Severity {
    /// Every entry of the severity table.
    pub const ALL: [Severity; 13] = [
        Severity::Unspecified,
        Severity::Error,
        Severity::Warning,
        Severity::Parse,
        Severity::Notice,
        Severity::CoreError,
        Severity::CoreWarning,
        Severity::CompileError,
        Severity::CompileWarning,
        Severity::UserError,
        Severity::UserWarning,
        Severity::UserNotice,
        Severity::Strict,
    ];

    /// Severities that stop execution unless allow-listed.
    pub const FATAL: [Severity; 5] = [
        Severity::Unspecified,
        Severity::Error,
        Severity::Parse,
        Severity::UserError,
        Severity::CompileError,
    ];

    /// Looks up a severity by its numeric code.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Returns the numeric code of this severity.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Returns the label shown in reports.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Unspecified | Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Parse => "Parsing Error",
            Severity::Notice => "Notice",
            Severity::CoreError => "Core Error",
            Severity::CoreWarning => "Core Warning",
            Severity::CompileError => "Compile Error",
            Severity::CompileWarning => "Compile Warning",
            Severity::UserError => "User Error",
            Severity::UserWarning => "User Warning",
            Severity::UserNotice => "User Notice",
            Severity::Strict => "Runtime Notice",
        }
    }

    /// Returns the command-line name of this severity.
    pub fn name(self) -> &'static str {
        match self {
            Severity::Unspecified => "unspecified",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Parse => "parse",
            Severity::Notice => "notice",
            Severity::CoreError => "core-error",
            Severity::CoreWarning => "core-warning",
            Severity::CompileError => "compile-error",
            Severity::CompileWarning => "compile-warning",
            Severity::UserError => "user-error",
            Severity::UserWarning => "user-warning",
            Severity::UserNotice => "user-notice",
            Severity::Strict => "strict",
        }
    }

    /// Returns true if this severity belongs to the fatal set.
    pub fn is_fatal(self) -> bool {
        Self::FATAL.contains(&self)
    }

    /// Returns true if `code` belongs to the fatal set.
    pub fn is_fatal_code(code: i64) -> bool {
        Self::from_code(code).is_some_and(Severity::is_fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a severity name is not part of the table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|severity| severity.name() == wanted)
            .ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}

/// Outcome of classifying a single severity code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Label resolved from the table, or the stringified code if unknown.
    pub label: String,
    /// Whether the failure must stop execution.
    pub fatal: bool,
}

/// Immutable classification rules: the severity table plus the continue-on
/// allow-list configured by the operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classifier {
    continue_on: BTreeSet<i64>,
}

impl Classifier {
    /// Creates a classifier that downgrades the given codes to non-fatal.
    pub fn new(continue_on: impl IntoIterator<Item = i64>) -> Self {
        Self {
            continue_on: continue_on.into_iter().collect(),
        }
    }

    /// Resolves the label for `code`; unknown codes pass through as digits.
    pub fn label(&self, code: i64) -> String {
        match Severity::from_code(code) {
            Some(severity) => severity.label().to_string(),
            None => code.to_string(),
        }
    }

    /// A code is fatal when it is in the fatal set and not allow-listed.
    pub fn is_fatal(&self, code: i64) -> bool {
        Severity::is_fatal_code(code) && !self.continue_on.contains(&code)
    }

    /// Classifies `code` into a label and a fatal flag.
    pub fn classify(&self, code: i64) -> Classification {
        Classification {
            label: self.label(code),
            fatal: self.is_fatal(code),
        }
    }
}
