use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use faultline::error::SelfReport;
use faultline::hooks::capture_frames;
use faultline::logging::{init_logging, LoggingConfig};
use faultline::{
    install_panic_hook, BufferStack, ErrorReporter, ExceptionOutcome, ExecutionMode,
    HtmlViews, HttpTransport, LastErrorSlot, OutputBuffer, RenderError, ReportPayload,
    ReportableError, ReporterConfig, RuntimeFailure, Severity, ShutdownGuard, TerminalConsole,
    ViewRenderer,
};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(version)]
#[command(about = "Drive the error reporter from the command line")]
struct Cli {
    /// Execution mode: interactive or served (detected from the environment by default)
    #[arg(long, global = true)]
    mode: Option<ExecutionMode>,

    /// Path to a TOML file with an [errors] table
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Events reported individually before throttling (overrides config)
    #[arg(long, global = true, value_name = "N")]
    threshold: Option<u64>,

    /// Fatal severity to downgrade to recoverable (repeatable, name or code)
    #[arg(long, global = true, value_name = "SEVERITY", value_parser = parse_severity)]
    continue_on: Vec<i64>,

    /// Protocol version for the served status line (defaults to SERVER_PROTOCOL)
    #[arg(long, global = true)]
    protocol: Option<String>,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    /// Text written to the response buffer before anything is captured
    #[arg(long, global = true, value_name = "TEXT")]
    prelude: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// View renderer used for served reports
    #[arg(long, global = true, hide = true, value_enum, default_value_t = RendererChoice::Html)]
    renderer: RendererChoice,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture one or more runtime events
    Event {
        /// Severity name (warning, user-error, ...) or numeric code
        #[arg(long, short, default_value = "warning", value_parser = parse_severity)]
        severity: i64,

        /// Number of events to capture
        #[arg(long, short = 'n', default_value = "1")]
        count: u64,

        /// Event message
        #[arg(long, short, default_value = "runtime event")]
        message: String,
    },
    /// Capture an uncaught error
    Exception {
        /// Code carried by the error
        #[arg(long, default_value = "0")]
        code: i64,

        /// Give the error a self-reporting handler returning this value
        #[arg(long, value_name = "BOOL")]
        self_report: Option<bool>,

        /// Error message
        #[arg(long, short, default_value = "uncaught error")]
        message: String,
    },
    /// Leave an unhandled error behind for shutdown capture
    Shutdown {
        /// Severity name or numeric code
        #[arg(long, short, default_value = "error", value_parser = parse_severity)]
        severity: i64,

        /// Error message
        #[arg(long, short, default_value = "unhandled error")]
        message: String,
    },
    /// Panic with the panic hook installed
    Panic {
        /// Panic message
        #[arg(long, short, default_value = "explicit panic")]
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RendererChoice {
    /// Built-in HTML and JSON views
    Html,
    /// A renderer that panics on every view, for exercising recovery paths
    Panic,
}

struct PanickingViews;

impl ViewRenderer for PanickingViews {
    fn render(&self, template: &str, _payload: &ReportPayload) -> Result<String, RenderError> {
        panic!("renderer for {template} panicked")
    }
}

/// Accept a severity name from the table or a raw numeric code.
fn parse_severity(value: &str) -> Result<i64, String> {
    if let Ok(code) = value.trim().parse::<i64>() {
        return Ok(code);
    }
    value
        .parse::<Severity>()
        .map(Severity::code)
        .map_err(|e| e.to_string())
}

#[derive(Debug, Error)]
#[error("{message}")]
struct CommandLineError {
    code: i64,
    message: String,
    handler: Option<PrintingHandler>,
}

#[derive(Debug)]
struct PrintingHandler(bool);

impl SelfReport for PrintingHandler {
    fn handle(&self) -> bool {
        println!("error reported itself");
        self.0
    }
}

impl ReportableError for CommandLineError {
    fn code(&self) -> i64 {
        self.code
    }

    fn kind(&self) -> &str {
        "CommandLineError"
    }

    fn location(&self) -> Option<(&str, u32)> {
        Some((file!(), line!()))
    }

    fn self_report(&self) -> Option<&dyn SelfReport> {
        self.handler.as_ref().map(|h| h as &dyn SelfReport)
    }
}

fn load_config(cli: &Cli) -> Result<ReporterConfig, faultline::ReporterConfigError> {
    let mut config = match &cli.config {
        Some(path) => ReporterConfig::load(path)?,
        None => ReporterConfig::from_env()?,
    };
    if let Some(threshold) = cli.threshold {
        config = config.with_throttling(threshold);
    }
    Ok(config.with_continue_on(cli.continue_on.iter().copied()))
}

fn build_reporter(cli: &Cli, config: ReporterConfig, output: BufferStack) -> ErrorReporter {
    let mode = cli.mode.unwrap_or_else(ExecutionMode::detect);
    let protocol = cli
        .protocol
        .clone()
        .or_else(|| std::env::var("SERVER_PROTOCOL").ok());
    let console = TerminalConsole::new();
    let console = if cli.no_color {
        console.with_colors(false)
    } else {
        console
    };

    let builder = ErrorReporter::builder(config)
        .mode(mode)
        .output(output)
        .console(console)
        .transport(HttpTransport::new(protocol).with_sink(std::io::stdout()));
    let builder = match cli.renderer {
        RendererChoice::Html => builder.renderer(HtmlViews::new()),
        RendererChoice::Panic => builder.renderer(PanickingViews),
    };
    builder.build()
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_verbosity(cli.verbose).with_timestamps(false));

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let output = BufferStack::stdout();
    let reporter = Arc::new(build_reporter(&cli, config, output.clone()));
    let slot = LastErrorSlot::new();
    let guard = ShutdownGuard::new(Arc::clone(&reporter), slot.clone());

    if let Some(prelude) = &cli.prelude {
        output.write(prelude.as_bytes());
    }

    match cli.command {
        Commands::Event {
            severity,
            count,
            ref message,
        } => {
            for n in 1..=count {
                let failure = RuntimeFailure::new(severity, format!("{message} #{n}"), file!(), line!())
                    .with_frames(capture_frames());
                let _ = reporter.capture_event(failure);
            }
        }
        Commands::Exception {
            code,
            self_report,
            ref message,
        } => {
            let error = CommandLineError {
                code,
                message: message.clone(),
                handler: self_report.map(PrintingHandler),
            };
            if let ExceptionOutcome::SelfReported(handled) = reporter.capture_exception(&error) {
                output.write(format!("handled: {handled}\n").as_bytes());
            }
        }
        Commands::Shutdown {
            severity,
            ref message,
        } => {
            slot.record(RuntimeFailure::new(severity, message.clone(), file!(), line!()));
        }
        Commands::Panic { ref message } => {
            install_panic_hook(Arc::clone(&reporter));
            panic!("{message}");
        }
    }

    drop(guard);
    ExitCode::SUCCESS
}
