//! Process-level capture hooks.
//!
//! A panic is the uncaught error of a Rust program, so [`install_panic_hook`]
//! routes panics into exception capture. [`ShutdownGuard`] runs shutdown
//! capture when `main` returns, with whatever was last put into its
//! [`LastErrorSlot`].

use std::panic;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{Frame, ReportableError, RuntimeFailure, Severity};
use crate::reporter::{is_rendering, panic_message, ErrorReporter};

/// Source file of this module; its frames never appear in reports.
pub(crate) const SOURCE: &str = file!();

const MAX_FRAMES: usize = 64;

const REPORT_THREAD: &str = "faultline-panic-report";

/// Frames belonging to the unwinding machinery rather than the program.
const RUNTIME_PREFIXES: [&str; 5] = [
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "rust_begin_unwind",
];

/// A panic presented as a reportable error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PanicFailure {
    message: String,
    location: Option<(String, u32)>,
    frames: Vec<Frame>,
}

impl PanicFailure {
    /// Create a failure from a panic message and its location.
    pub fn new(message: impl Into<String>, location: Option<(String, u32)>) -> Self {
        Self {
            message: message.into(),
            location,
            frames: Vec::new(),
        }
    }

    /// Attach a backtrace.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }
}

impl ReportableError for PanicFailure {
    fn code(&self) -> i64 {
        Severity::Error.code()
    }

    fn kind(&self) -> &str {
        "Panic"
    }

    fn location(&self) -> Option<(&str, u32)> {
        self.location
            .as_ref()
            .map(|(file, line)| (file.as_str(), *line))
    }

    fn frames(&self) -> Vec<Frame> {
        self.frames.clone()
    }
}

/// Route panics on every thread into `reporter`.
///
/// The report is produced on a helper thread, so a renderer that panics while
/// reporting a panic is contained like any other renderer panic and a fatal
/// panic still exits with status 1. The previously installed hook runs for
/// panics raised while the reporter itself is rendering.
pub fn install_panic_hook(reporter: Arc<ErrorReporter>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if is_rendering() {
            previous(info);
            return;
        }
        let location = info
            .location()
            .map(|location| (location.file().to_string(), location.line()));
        let failure = PanicFailure::new(panic_message(info.payload()), location)
            .with_frames(capture_frames());
        debug!(message = %failure, "panic routed to reporter");
        report_off_thread(&reporter, &failure);
    }));
}

// A thread inside its panic hook aborts on any further panic.
fn report_off_thread(reporter: &ErrorReporter, failure: &PanicFailure) {
    thread::scope(|scope| {
        let spawned = thread::Builder::new()
            .name(REPORT_THREAD.to_string())
            .spawn_scoped(scope, || reporter.capture_exception(failure));
        match spawned {
            Ok(handle) => {
                if handle.join().is_err() {
                    warn!("panic report thread unwound");
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot start panic report thread, reporting in place");
                let _ = reporter.capture_exception(failure);
            }
        }
    });
}

/// Capture the current call stack, most recent first, without the frames of
/// the unwinding machinery.
pub fn capture_frames() -> Vec<Frame> {
    let mut frames = Vec::new();
    backtrace::trace(|raw| {
        backtrace::resolve_frame(raw, |symbol| {
            let function = symbol.name().map(|name| format!("{name:#}"));
            if function
                .as_deref()
                .is_some_and(|name| RUNTIME_PREFIXES.iter().any(|p| name.starts_with(p)))
            {
                return;
            }
            frames.push(Frame {
                function,
                file: symbol.filename().map(|path| path.display().to_string()),
                line: symbol.lineno(),
            });
        });
        frames.len() < MAX_FRAMES
    });
    frames
}

/// Holds the last unhandled runtime failure until shutdown.
#[derive(Debug, Clone, Default)]
pub struct LastErrorSlot {
    inner: Arc<Mutex<Option<RuntimeFailure>>>,
}

impl LastErrorSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored failure.
    pub fn record(&self, failure: RuntimeFailure) {
        *self.lock() = Some(failure);
    }

    /// Remove and return the stored failure.
    pub fn take(&self) -> Option<RuntimeFailure> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<RuntimeFailure>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs shutdown capture when dropped, then flushes the reporter's output.
///
/// Keep it alive for the whole of `main`:
///
/// ```no_run
/// use std::sync::Arc;
/// use faultline::{ErrorReporter, LastErrorSlot, ReporterConfig, ShutdownGuard};
///
/// let reporter = Arc::new(ErrorReporter::builder(ReporterConfig::default()).build());
/// let slot = LastErrorSlot::new();
/// let _guard = ShutdownGuard::new(Arc::clone(&reporter), slot.clone());
/// ```
#[derive(Debug)]
pub struct ShutdownGuard {
    reporter: Arc<ErrorReporter>,
    slot: LastErrorSlot,
}

impl ShutdownGuard {
    /// Create a guard reading `slot` at shutdown.
    pub fn new(reporter: Arc<ErrorReporter>, slot: LastErrorSlot) -> Self {
        Self { reporter, slot }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.reporter.capture_shutdown(self.slot.take());
        self.reporter.finish();
    }
}
