//! Shared fakes for reporter integration tests.
#![allow(dead_code)]

use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use faultline::{
    BufferStack, Color, Console, ErrorReporter, ExecutionMode, RenderError, ReportPayload,
    ReporterConfig, Terminator, Transport, ViewRenderer,
};

/// Panic payload carried out of a terminated reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated(pub i32);

/// Terminator that unwinds with [`Terminated`] instead of exiting.
pub struct PanicTerminator;

impl Terminator for PanicTerminator {
    fn terminate(&self, status: i32) -> ! {
        panic::resume_unwind(Box::new(Terminated(status)))
    }
}

/// Run `f`, returning the exit status if the reporter terminated.
pub fn run_to_exit(f: impl FnOnce()) -> Option<i32> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => None,
        Err(payload) => match payload.downcast::<Terminated>() {
            Ok(terminated) => Some(terminated.0),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// In-memory byte sink shared between a test and a reporter.
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Console that records lines and tags colors instead of painting them.
#[derive(Clone, Default)]
pub struct RecordingConsole(Arc<Mutex<Vec<String>>>);

impl RecordingConsole {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Console for RecordingConsole {
    fn write(&self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        format!("[{color:?}]{text}")
    }
}

#[derive(Default)]
struct TransportState {
    sent: bool,
    status_lines: Vec<String>,
}

/// Transport that records status lines.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    protocol: Option<String>,
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn with_protocol(protocol: &str) -> Self {
        Self {
            protocol: Some(protocol.to_string()),
            ..Self::default()
        }
    }

    pub fn headers_already_sent(self) -> Self {
        self.state.lock().unwrap().sent = true;
        self
    }

    pub fn status_lines(&self) -> Vec<String> {
        self.state.lock().unwrap().status_lines.clone()
    }
}

impl Transport for RecordingTransport {
    fn protocol_version(&self) -> Option<String> {
        self.protocol.clone()
    }

    fn headers_sent(&self) -> bool {
        self.state.lock().unwrap().sent
    }

    fn set_status_line(&self, line: &str) {
        let mut state = self.state.lock().unwrap();
        state.status_lines.push(line.to_string());
        state.sent = true;
    }
}

/// Renderer with a fixed behavior per call, recording the templates used.
#[derive(Clone)]
pub struct ScriptedRenderer {
    behavior: Behavior,
    calls: Arc<Mutex<Vec<(String, ReportPayload)>>>,
}

#[derive(Clone, Copy)]
enum Behavior {
    Echo,
    Fail,
    Panic,
}

impl ScriptedRenderer {
    /// Renders `<template>|<label>|<message>`.
    pub fn echo() -> Self {
        Self::with(Behavior::Echo)
    }

    /// Always returns an error.
    pub fn failing() -> Self {
        Self::with(Behavior::Fail)
    }

    /// Always panics.
    pub fn panicking() -> Self {
        Self::with(Behavior::Panic)
    }

    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(String, ReportPayload)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ViewRenderer for ScriptedRenderer {
    fn render(&self, template: &str, payload: &ReportPayload) -> Result<String, RenderError> {
        self.calls
            .lock()
            .unwrap()
            .push((template.to_string(), payload.clone()));
        match self.behavior {
            Behavior::Echo => Ok(format!(
                "{template}|{}|{}\n",
                payload.record.severity_label(),
                payload.record.message()
            )),
            Behavior::Fail => Err(RenderError::Failed("template crashed".to_string())),
            Behavior::Panic => panic!("template exploded"),
        }
    }
}

/// A served-mode reporter wired to recording fakes.
pub struct Harness {
    pub reporter: ErrorReporter,
    pub output: BufferStack,
    pub sink: SharedSink,
    pub console: RecordingConsole,
    pub transport: RecordingTransport,
    pub renderer: ScriptedRenderer,
}

impl Harness {
    pub fn served(config: ReporterConfig) -> Self {
        Self::build(config, ExecutionMode::Served, ScriptedRenderer::echo(), RecordingTransport::default())
    }

    pub fn interactive(config: ReporterConfig) -> Self {
        Self::build(
            config,
            ExecutionMode::Interactive,
            ScriptedRenderer::echo(),
            RecordingTransport::default(),
        )
    }

    pub fn build(
        config: ReporterConfig,
        mode: ExecutionMode,
        renderer: ScriptedRenderer,
        transport: RecordingTransport,
    ) -> Self {
        let sink = SharedSink::default();
        let output = BufferStack::new(sink.clone());
        let console = RecordingConsole::default();
        let reporter = ErrorReporter::builder(config)
            .mode(mode)
            .output(output.clone())
            .renderer(renderer.clone())
            .console(console.clone())
            .transport(transport.clone())
            .terminator(PanicTerminator)
            .build();
        Self {
            reporter,
            output,
            sink,
            console,
            transport,
            renderer,
        }
    }

    /// Everything that reached the client so far.
    pub fn delivered(&self) -> String {
        self.sink.text()
    }

    /// Everything still buffered.
    pub fn buffered(&self) -> String {
        String::from_utf8_lossy(&faultline::OutputBuffer::snapshot(&self.output)).into_owned()
    }
}
