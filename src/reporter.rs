//! The error reporter: capture, classify, throttle, render.
//!
//! Three entry points receive failures: [`ErrorReporter::capture_event`] for
//! runtime errors and warnings, [`ErrorReporter::capture_exception`] for
//! errors that escaped all handling, and [`ErrorReporter::capture_shutdown`]
//! for the last unhandled error at process end. Each one either returns a
//! continue signal or terminates the process itself; none of them propagates
//! an error to its caller.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, trace, warn};

use crate::config::ReporterConfig;
use crate::error::failure::RawFailure;
use crate::error::{Classifier, FailureRecord, ReportableError, RuntimeFailure, Severity};
use crate::output::{BufferStack, OutputBuffer};
use crate::process::{ProcessExit, Terminator};
use crate::render::{HtmlViews, RenderError, ReportPayload, ViewRenderer};
use crate::throttle::{EventThrottle, ThrottleVerdict};
use crate::transport::{ExecutionMode, HttpTransport, Transport, DEFAULT_PROTOCOL};
use crate::ui::{Color, Console, TerminalConsole};

/// Source file of this module; its frames never appear in reports.
pub(crate) const SOURCE: &str = file!();

/// Exit status used for every fatal termination.
pub const FATAL_EXIT_STATUS: i32 = 1;

thread_local! {
    static RENDERING: Cell<bool> = const { Cell::new(false) };
}

/// Returns true while the reporter is rendering on the current thread.
pub(crate) fn is_rendering() -> bool {
    RENDERING.with(Cell::get)
}

struct RenderingGuard {
    previous: bool,
}

impl RenderingGuard {
    fn enter() -> Self {
        Self {
            previous: RENDERING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for RenderingGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        RENDERING.with(|flag| flag.set(previous));
    }
}

/// Signal returned by event capture: the caller keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Flow {
    /// Resume normal execution.
    Continue,
}

/// Result of exception capture when the process was not terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionOutcome {
    /// The error presented itself; carries the result of its handler.
    SelfReported(bool),
    /// The reporter rendered a non-fatal report.
    Reported,
}

/// Process-wide reporter state.
#[derive(Debug, Default, Clone)]
pub struct ReporterState {
    event_count: u64,
    non_fatal_log: Vec<FailureRecord>,
}

impl ReporterState {
    /// Number of event captures so far.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Non-fatal served-mode records, in the order they were reported.
    pub fn non_fatal_log(&self) -> &[FailureRecord] {
        &self.non_fatal_log
    }
}

/// Centralized failure reporter.
///
/// Holds its own state, so separate instances (per test, per request) never
/// share counters. All collaborators are injected through [`ReporterBuilder`].
pub struct ErrorReporter {
    config: ReporterConfig,
    classifier: Classifier,
    throttle: EventThrottle,
    mode: ExecutionMode,
    output: Box<dyn OutputBuffer>,
    renderer: Box<dyn ViewRenderer>,
    console: Box<dyn Console>,
    transport: Box<dyn Transport>,
    terminator: Box<dyn Terminator>,
    state: Mutex<ReporterState>,
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("state", &*self.lock_state())
            .finish_non_exhaustive()
    }
}

impl ErrorReporter {
    /// Start building a reporter with `config`.
    pub fn builder(config: ReporterConfig) -> ReporterBuilder {
        ReporterBuilder::new(config)
    }

    /// The configuration this reporter was built with.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// The execution mode reports are rendered for.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Whether reports go to a terminal.
    pub fn is_interactive(&self) -> bool {
        self.mode.is_interactive()
    }

    /// Number of event captures so far.
    pub fn event_count(&self) -> u64 {
        self.lock_state().event_count
    }

    /// A copy of the current state.
    pub fn state(&self) -> ReporterState {
        self.lock_state().clone()
    }

    /// Capture a runtime error, warning or notice.
    ///
    /// Every call is counted. Up to the throttling threshold each event is
    /// rendered; the next one (if its severity is enabled) is replaced by a
    /// single "threshold reached" notice; later events are absorbed. Fatal
    /// events within the threshold terminate the process.
    pub fn capture_event(&self, failure: RuntimeFailure) -> Flow {
        let count = {
            let mut state = self.lock_state();
            state.event_count += 1;
            state.event_count
        };
        let severity = failure.severity;
        let record = self.classify(failure.into());
        debug!(count, severity, fatal = record.is_fatal(), "captured runtime event");

        match self.throttle.verdict(count, severity) {
            ThrottleVerdict::Report => self.show(record),
            ThrottleVerdict::ThresholdReached => {
                info!(
                    threshold = self.throttle.threshold(),
                    "error throttling threshold reached"
                );
                let notice = self.classify(RawFailure::throttle_notice());
                self.show(notice);
            }
            ThrottleVerdict::Suppressed => trace!(count, "runtime event suppressed"),
        }
        Flow::Continue
    }

    /// Capture an error that escaped all handling.
    ///
    /// Errors with the [`SelfReport`](crate::error::SelfReport) capability
    /// present themselves and their result is returned unchanged. Everything
    /// else is rendered; fatal errors terminate the process.
    pub fn capture_exception(&self, error: &dyn ReportableError) -> ExceptionOutcome {
        if let Some(handler) = error.self_report() {
            debug!(kind = error.kind(), "exception reports itself");
            return ExceptionOutcome::SelfReported(handler.handle());
        }
        let record = self.classify(RawFailure::from_exception(error));
        debug!(kind = record.kind(), fatal = record.is_fatal(), "captured exception");
        self.show(record);
        ExceptionOutcome::Reported
    }

    /// Capture the last unhandled error at process end.
    ///
    /// Does nothing without an error or when its severity is not in the fatal
    /// set. Otherwise the error is rendered and the process exits with status 1
    /// even if the continue-on list downgraded it.
    pub fn capture_shutdown(&self, last_error: Option<RuntimeFailure>) {
        let Some(failure) = last_error else {
            return;
        };
        if !Severity::is_fatal_code(failure.severity) {
            trace!(severity = failure.severity, "last error is not fatal");
            return;
        }
        let record = self.classify(failure.into());
        debug!(fatal = record.is_fatal(), "captured fatal error at shutdown");
        self.show(record);
        self.terminate()
    }

    /// Flush buffered output at normal process end.
    pub fn finish(&self) {
        if let Err(e) = self.output.flush() {
            warn!(error = %e, "failed to flush buffered output");
        }
    }

    fn classify(&self, raw: RawFailure) -> FailureRecord {
        FailureRecord::classify(raw, &self.classifier)
    }

    fn show(&self, record: FailureRecord) {
        let _guard = RenderingGuard::enter();
        if !record.is_fatal() {
            if self.mode.is_interactive() {
                self.write_line(&record);
            } else {
                self.show_inline(record);
            }
            return;
        }

        let discarded_bytes = self.discard_output();
        if self.mode.is_interactive() {
            self.write_line(&record);
            self.terminate()
        } else {
            self.show_fatal(record, discarded_bytes)
        }
    }

    /// Throw away everything buffered so far and open one clean buffer.
    /// Returns the number of bytes discarded.
    fn discard_output(&self) -> usize {
        let discarded = self.output.snapshot().len();
        self.output.drain();
        self.output.open(self.config.output_filter.clone());
        discarded
    }

    fn write_line(&self, record: &FailureRecord) {
        let line = self.console.colorize(&record.summary_line(), Color::Red);
        self.console.write(&line);
    }

    fn show_inline(&self, record: FailureRecord) {
        self.lock_state().non_fatal_log.push(record.clone());
        let payload = ReportPayload::inline(record);
        match self.render(&self.config.view_error, &payload) {
            Ok(block) => self.output.write(block.as_bytes()),
            Err(e) => {
                warn!(error = %e, template = %self.config.view_error, "error view failed, writing raw message");
                self.output
                    .write(format!("{}<br />\n", payload.record.message()).as_bytes());
            }
        }
    }

    fn show_fatal(&self, record: FailureRecord, discarded_bytes: usize) -> ! {
        if !self.transport.headers_sent() {
            let protocol = self
                .transport
                .protocol_version()
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
            self.transport
                .set_status_line(&format!("{protocol} 500 Internal Server Error"));
        }

        let payload = ReportPayload {
            record,
            non_fatal: self.lock_state().non_fatal_log.clone(),
            discarded_bytes,
        };
        match self.render(&self.config.view_fatal, &payload) {
            Ok(page) => self.output.write(page.as_bytes()),
            Err(e) => {
                warn!(error = %e, template = %self.config.view_fatal, "fatal view failed, writing plain text");
                self.output.write(payload.record.summary_line().as_bytes());
            }
        }
        self.terminate()
    }

    fn render(&self, template: &str, payload: &ReportPayload) -> Result<String, RenderError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.renderer.render(template, payload)))
            .unwrap_or_else(|panic| Err(RenderError::Panicked(panic_message(&*panic))))
    }

    fn terminate(&self) -> ! {
        error!(status = FATAL_EXIT_STATUS, "fatal failure reported, terminating");
        self.finish();
        self.terminator.terminate(FATAL_EXIT_STATUS)
    }

    fn lock_state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extract a message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Builder for [`ErrorReporter`].
///
/// Every collaborator has a production default: mode detected from the
/// environment, output buffered to stdout, built-in HTML views, a colored
/// terminal console, a CGI transport and real process exit.
pub struct ReporterBuilder {
    config: ReporterConfig,
    mode: Option<ExecutionMode>,
    output: Option<Box<dyn OutputBuffer>>,
    renderer: Option<Box<dyn ViewRenderer>>,
    console: Option<Box<dyn Console>>,
    transport: Option<Box<dyn Transport>>,
    terminator: Option<Box<dyn Terminator>>,
}

impl ReporterBuilder {
    /// Create a builder with `config` and default collaborators.
    pub fn new(config: ReporterConfig) -> Self {
        Self {
            config,
            mode: None,
            output: None,
            renderer: None,
            console: None,
            transport: None,
            terminator: None,
        }
    }

    /// Fix the execution mode instead of detecting it.
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the output buffer.
    pub fn output(mut self, output: impl OutputBuffer + 'static) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Set the view renderer.
    pub fn renderer(mut self, renderer: impl ViewRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Set the interactive console.
    pub fn console(mut self, console: impl Console + 'static) -> Self {
        self.console = Some(Box::new(console));
        self
    }

    /// Set the transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Set how the process is terminated.
    pub fn terminator(mut self, terminator: impl Terminator + 'static) -> Self {
        self.terminator = Some(Box::new(terminator));
        self
    }

    /// Build the reporter.
    pub fn build(self) -> ErrorReporter {
        let config = self.config;
        ErrorReporter {
            classifier: Classifier::new(config.continue_on.iter().copied()),
            throttle: EventThrottle::new(config.throttling, config.reporting),
            mode: self.mode.unwrap_or_else(ExecutionMode::detect),
            output: self
                .output
                .unwrap_or_else(|| Box::new(BufferStack::stdout())),
            renderer: self.renderer.unwrap_or_else(|| Box::new(HtmlViews::new())),
            console: self
                .console
                .unwrap_or_else(|| Box::new(TerminalConsole::new())),
            transport: self
                .transport
                .unwrap_or_else(|| Box::new(HttpTransport::from_env())),
            terminator: self.terminator.unwrap_or_else(|| Box::new(ProcessExit)),
            state: Mutex::new(ReporterState::default()),
            config,
        }
    }
}
