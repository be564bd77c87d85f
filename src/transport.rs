//! Execution mode detection and HTTP transport introspection.
//!
//! The reporter renders differently for terminal sessions and served
//! responses. In served mode it also needs to know whether response headers
//! already went out and which protocol version the request used.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

/// Protocol used for the status line when the transport did not supply one.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Where reports go: a terminal or an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Terminal-like channel; reports are single colorized lines.
    #[default]
    Interactive,
    /// HTTP response; reports are rendered pages.
    Served,
}

impl ExecutionMode {
    /// Detect the mode from the CGI environment.
    ///
    /// A process started by a web server gets `GATEWAY_INTERFACE` or
    /// `SERVER_PROTOCOL`; anything else is treated as interactive.
    pub fn detect() -> Self {
        let served = ["GATEWAY_INTERFACE", "SERVER_PROTOCOL"]
            .iter()
            .any(|key| std::env::var_os(key).is_some());
        if served {
            ExecutionMode::Served
        } else {
            ExecutionMode::Interactive
        }
    }

    /// Returns true for terminal sessions.
    pub fn is_interactive(self) -> bool {
        matches!(self, ExecutionMode::Interactive)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Interactive => write!(f, "interactive"),
            ExecutionMode::Served => write!(f, "served"),
        }
    }
}

/// Error returned when parsing an unknown execution mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown execution mode: {0} (expected interactive or served)")]
pub struct UnknownMode(pub String);

impl FromStr for ExecutionMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interactive" | "cli" | "terminal" => Ok(ExecutionMode::Interactive),
            "served" | "http" | "server" => Ok(ExecutionMode::Served),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Transport introspection for served mode.
pub trait Transport: Send + Sync {
    /// Protocol version of the current request, if the transport knows it.
    fn protocol_version(&self) -> Option<String>;

    /// Whether response headers were already sent.
    fn headers_sent(&self) -> bool;

    /// Set the response status line.
    fn set_status_line(&self, line: &str);
}

#[derive(Default)]
struct HeaderState {
    sent: bool,
    status_line: Option<String>,
    sink: Option<Box<dyn Write + Send>>,
}

/// Transport for a CGI-style response written to a byte stream.
///
/// The status line is written to the sink as soon as it is set, which also
/// marks the headers as sent.
#[derive(Default)]
pub struct HttpTransport {
    protocol: Option<String>,
    state: Mutex<HeaderState>,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("HttpTransport")
            .field("protocol", &self.protocol)
            .field("sent", &state.sent)
            .field("status_line", &state.status_line)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for a request made with `protocol`.
    pub fn new(protocol: Option<String>) -> Self {
        Self {
            protocol,
            state: Mutex::new(HeaderState::default()),
        }
    }

    /// Create a transport from the `SERVER_PROTOCOL` environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var("SERVER_PROTOCOL").ok())
    }

    /// Write the status line and header terminator to `sink` when set.
    pub fn with_sink(self, sink: impl Write + Send + 'static) -> Self {
        self.lock().sink = Some(Box::new(sink));
        self
    }

    /// The status line set so far, if any.
    pub fn status_line(&self) -> Option<String> {
        self.lock().status_line.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HeaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for HttpTransport {
    fn protocol_version(&self) -> Option<String> {
        self.protocol.clone().filter(|p| !p.trim().is_empty())
    }

    fn headers_sent(&self) -> bool {
        self.lock().sent
    }

    fn set_status_line(&self, line: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.status_line = Some(line.to_string());
        if let Some(sink) = state.sink.as_mut() {
            let written = write!(sink, "{line}\r\n\r\n").and_then(|()| sink.flush());
            if let Err(e) = written {
                tracing::warn!(error = %e, "failed to write status line");
            }
            state.sent = true;
        }
    }
}
