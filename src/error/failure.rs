//! Raw failure sources handed to the reporter.
//!
//! Runtime failures arrive as plain data with a numeric severity. Uncaught
//! errors arrive as trait objects implementing [`ReportableError`], which may
//! opt into presenting themselves through the [`SelfReport`] capability.

use super::classification::Severity;
use super::record::Frame;

/// A runtime error, warning or notice raised outside of the error-propagation
/// machinery, captured through the event or shutdown hooks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeFailure {
    /// Numeric severity understood by the classification table.
    pub severity: i64,
    /// Human-readable message.
    pub message: String,
    /// Source file the failure originated from.
    pub file: String,
    /// Source line the failure originated from.
    pub line: u32,
    /// Call stack at the point of failure, most recent first.
    pub frames: Vec<Frame>,
}

impl RuntimeFailure {
    /// Creates a runtime failure without a backtrace.
    pub fn new(
        severity: impl Into<i64>,
        message: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        Self {
            severity: severity.into(),
            message: message.into(),
            file: file.into(),
            line,
            frames: Vec::new(),
        }
    }

    /// Attaches a backtrace.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }
}

impl From<Severity> for i64 {
    fn from(severity: Severity) -> Self {
        severity.code()
    }
}

/// Capability of errors that know how to present themselves.
///
/// When an uncaught error exposes this capability the reporter delegates to
/// [`SelfReport::handle`] and skips its default rendering entirely.
pub trait SelfReport {
    /// Presents the error; the result is handed back to the caller verbatim.
    fn handle(&self) -> bool;
}

/// An error that escaped all handling and can be reported.
///
/// Only `Display` is required beyond the `Error` bound; every other method has
/// a default so plain error types need a one-line impl.
pub trait ReportableError: std::error::Error + Send + Sync {
    /// Code carried by the error, classified like a runtime severity.
    fn code(&self) -> i64 {
        Severity::Unspecified.code()
    }

    /// Identifier of the error's type.
    fn kind(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Where the error was raised, if known.
    fn location(&self) -> Option<(&str, u32)> {
        None
    }

    /// Call stack at the point the error was raised, most recent first.
    fn frames(&self) -> Vec<Frame> {
        Vec::new()
    }

    /// Returns the self-reporting capability, if this error has one.
    fn self_report(&self) -> Option<&dyn SelfReport> {
        None
    }
}

/// Failure data common to every capture path, before classification.
#[derive(Clone, Debug)]
pub(crate) struct RawFailure {
    pub kind: String,
    pub code: i64,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub frames: Vec<Frame>,
}

pub(crate) const RUNTIME_FAILURE_KIND: &str = "RuntimeFailure";

pub(crate) const THROTTLE_NOTICE: &str =
    "Error throttling threshold was reached, no more full error reports are shown.";

impl RawFailure {
    pub fn from_exception(error: &dyn ReportableError) -> Self {
        let (file, line) = error.location().unwrap_or(("", 0));
        Self {
            kind: error.kind().to_string(),
            code: error.code(),
            message: error.to_string(),
            file: file.to_string(),
            line,
            frames: error.frames(),
        }
    }

    pub fn throttle_notice() -> Self {
        Self {
            kind: RUNTIME_FAILURE_KIND.to_string(),
            code: Severity::UserNotice.code(),
            message: THROTTLE_NOTICE.to_string(),
            file: String::new(),
            line: 0,
            frames: Vec::new(),
        }
    }
}

impl From<RuntimeFailure> for RawFailure {
    fn from(failure: RuntimeFailure) -> Self {
        Self {
            kind: RUNTIME_FAILURE_KIND.to_string(),
            code: failure.severity,
            message: failure.message,
            file: failure.file,
            line: failure.line,
            frames: failure.frames,
        }
    }
}
