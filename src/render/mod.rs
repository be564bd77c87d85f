//! Rendering collaborator contract for served-mode reports.
//!
//! The reporter hands a [`ReportPayload`] and a template id to a
//! [`ViewRenderer`]. Renderers may fail; the reporter always recovers with a
//! plain-text fallback.

mod html;

pub use html::HtmlViews;

use serde::Serialize;
use thiserror::Error;

use crate::error::FailureRecord;

/// Template id of the full-page fatal report.
pub const FATAL_VIEW: &str = "errors/fatal";

/// Template id of the inline non-fatal report.
pub const ERROR_VIEW: &str = "errors/error";

/// Template id of the JSON report.
pub const JSON_VIEW: &str = "errors/json";

/// Errors that can occur while producing a report.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template id is unknown to the renderer.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// The payload could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The renderer failed for another reason.
    #[error("render failed: {0}")]
    Failed(String),

    /// The renderer panicked.
    #[error("renderer panicked: {0}")]
    Panicked(String),
}

/// Data handed to a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportPayload {
    /// The failure being reported.
    #[serde(flatten)]
    pub record: FailureRecord,
    /// Non-fatal failures reported earlier in this process (fatal reports only).
    pub non_fatal: Vec<FailureRecord>,
    /// Number of buffered bytes discarded before the fatal report.
    pub discarded_bytes: usize,
}

impl ReportPayload {
    /// Payload for an inline, non-fatal report.
    pub fn inline(record: FailureRecord) -> Self {
        Self {
            record,
            non_fatal: Vec::new(),
            discarded_bytes: 0,
        }
    }
}

/// Renders report templates.
pub trait ViewRenderer: Send + Sync {
    /// Render `template` with `payload` to a string.
    fn render(&self, template: &str, payload: &ReportPayload) -> Result<String, RenderError>;
}
