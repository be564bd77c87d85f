//! Faultline - error and panic interception with throttled, mode-aware reports
//!
//! An [`ErrorReporter`] receives failures from three places: runtime events,
//! uncaught errors (including panics, via [`install_panic_hook`]) and the last
//! unhandled error at shutdown (via [`ShutdownGuard`]). Each failure is
//! classified by severity, throttled, and rendered either as a colored
//! terminal line or, for served requests, as HTML in the response body. Fatal
//! failures in served mode replace everything buffered so far with an error
//! page under a 500 status line; every fatal path ends the process with
//! status 1.

pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod output;
pub mod process;
pub mod render;
pub mod reporter;
pub mod throttle;
pub mod transport;
pub mod ui;

pub use config::{ReporterConfig, ReporterConfigError};
pub use error::{FailureRecord, Frame, ReportableError, RuntimeFailure, SelfReport, Severity};
pub use hooks::{install_panic_hook, LastErrorSlot, PanicFailure, ShutdownGuard};
pub use output::{BufferStack, OutputBuffer, OutputFilter};
pub use process::{ProcessExit, Terminator};
pub use render::{HtmlViews, RenderError, ReportPayload, ViewRenderer};
pub use reporter::{ErrorReporter, ExceptionOutcome, Flow, ReporterBuilder, ReporterState};
pub use transport::{ExecutionMode, HttpTransport, Transport};
pub use ui::{Color, Console, TerminalConsole};
