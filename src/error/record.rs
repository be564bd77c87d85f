//! The canonical failure record shared by every capture path and renderer.

use std::path::Path;

use serde::Serialize;

use super::classification::Classifier;
use super::failure::RawFailure;

/// One entry of a captured call stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Symbol name, when it could be resolved.
    pub function: Option<String>,
    /// Source file, when known.
    pub file: Option<String>,
    /// Source line, when known.
    pub line: Option<u32>,
}

impl Frame {
    /// Creates a fully resolved frame.
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            function: Some(function.into()),
            file: Some(file.into()),
            line: Some(line),
        }
    }

    /// Creates a frame whose source location is unknown.
    pub fn unresolved(function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            file: None,
            line: None,
        }
    }

    /// Returns true if this frame points into the reporter's own implementation.
    pub fn is_reporter_frame(&self) -> bool {
        self.file.as_deref().is_some_and(is_reporter_source)
    }
}

fn is_reporter_source(file: &str) -> bool {
    let path = Path::new(file);
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    [crate::reporter::SOURCE, crate::hooks::SOURCE]
        .iter()
        .any(|own| path == Path::new(own) || path == manifest.join(own).as_path())
}

/// Keeps frames that have a source file and do not belong to the reporter.
pub(crate) fn reportable_frames(frames: Vec<Frame>) -> Vec<Frame> {
    frames
        .into_iter()
        .filter(|frame| frame.file.is_some() && !frame.is_reporter_frame())
        .collect()
}

/// Converts a path to forward-slash form for display.
pub fn display_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Canonical, renderer-agnostic representation of one captured failure.
///
/// Records are only built by the reporter, which classifies them exactly once;
/// the fatal flag cannot change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    kind: String,
    severity_code: i64,
    severity_label: String,
    message: String,
    source_path: String,
    original_path: String,
    source_line: u32,
    stack_frames: Vec<Frame>,
    is_fatal: bool,
}

impl FailureRecord {
    pub(crate) fn classify(raw: RawFailure, classifier: &Classifier) -> Self {
        let classification = classifier.classify(raw.code);
        Self {
            kind: raw.kind,
            severity_code: raw.code,
            severity_label: classification.label,
            message: raw.message,
            source_path: display_path(&raw.file),
            original_path: raw.file,
            source_line: raw.line,
            stack_frames: reportable_frames(raw.frames),
            is_fatal: classification.fatal,
        }
    }

    /// Identifier of the originating type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Raw severity code.
    pub fn severity_code(&self) -> i64 {
        self.severity_code
    }

    /// Label resolved from the severity table.
    pub fn severity_label(&self) -> &str {
        &self.severity_label
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Origin path with forward slashes.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// Origin path exactly as captured.
    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    /// Origin line.
    pub fn source_line(&self) -> u32 {
        self.source_line
    }

    /// Filtered call stack, most recent first.
    pub fn stack_frames(&self) -> &[Frame] {
        &self.stack_frames
    }

    /// Whether this failure stops execution.
    pub fn is_fatal(&self) -> bool {
        self.is_fatal
    }

    /// Single-line form: `SEVERITY - MESSAGE in PATH on line N`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} - {} in {} on line {}",
            self.severity_label, self.message, self.source_path, self.source_line
        )
    }
}
