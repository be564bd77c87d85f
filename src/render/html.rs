//! Built-in report templates.
//!
//! Provides a full HTML page for fatal failures, an inline HTML block for
//! non-fatal ones, and a JSON document for API consumers.

use super::{RenderError, ReportPayload, ViewRenderer, ERROR_VIEW, FATAL_VIEW, JSON_VIEW};
use crate::error::{FailureRecord, Frame};

/// Built-in renderer for the `errors/*` templates.
#[derive(Debug, Clone)]
pub struct HtmlViews {
    /// Page title of fatal reports
    title: String,
    /// Include CSS inline
    inline_css: bool,
}

impl Default for HtmlViews {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlViews {
    /// Create the renderer with default settings.
    pub fn new() -> Self {
        Self {
            title: "Internal Server Error".to_string(),
            inline_css: true,
        }
    }

    /// Set the page title of fatal reports.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set whether CSS is embedded in fatal pages.
    pub fn with_inline_css(mut self, inline_css: bool) -> Self {
        self.inline_css = inline_css;
        self
    }

    fn render_fatal(&self, payload: &ReportPayload) -> String {
        let record = &payload.record;
        let css = if self.inline_css {
            Self::default_css()
        } else {
            ""
        };

        let earlier = if payload.non_fatal.is_empty() {
            String::new()
        } else {
            let mut html = format!(
                "<section class=\"earlier\">\n<h2>Earlier errors ({})</h2>\n",
                payload.non_fatal.len()
            );
            for previous in &payload.non_fatal {
                html.push_str(&Self::inline_block(previous));
            }
            html.push_str("</section>\n");
            html
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <h1>{severity}</h1>
        <p class="message">{message}</p>
        <p class="origin"><code>{path}</code> on line {line}</p>
        <p class="kind">{kind}</p>
{backtrace}{earlier}    </div>
</body>
</html>
"#,
            title = escape_html(&self.title),
            css = css,
            severity = escape_html(record.severity_label()),
            message = escape_html(record.message()),
            path = escape_html(record.source_path()),
            line = record.source_line(),
            kind = escape_html(record.kind()),
            backtrace = Self::backtrace_table(record.stack_frames()),
            earlier = earlier,
        )
    }

    fn inline_block(record: &FailureRecord) -> String {
        format!(
            "<div class=\"error-block\"><strong>{}</strong> - {} in <code>{}</code> on line {}</div>\n",
            escape_html(record.severity_label()),
            escape_html(record.message()),
            escape_html(record.source_path()),
            record.source_line()
        )
    }

    fn backtrace_table(frames: &[Frame]) -> String {
        if frames.is_empty() {
            return String::new();
        }
        let mut html = String::from("<table class=\"backtrace\">\n");
        html.push_str("<thead><tr><th>Function</th><th>File</th><th>Line</th></tr></thead>\n<tbody>\n");
        for frame in frames {
            html.push_str(&format!(
                "<tr><td>{}</td><td><code>{}</code></td><td>{}</td></tr>\n",
                escape_html(frame.function.as_deref().unwrap_or("?")),
                escape_html(&crate::error::display_path(frame.file.as_deref().unwrap_or(""))),
                frame.line.map(|l| l.to_string()).unwrap_or_default()
            ));
        }
        html.push_str("</tbody>\n</table>\n");
        html
    }

    fn default_css() -> &'static str {
        "body{font-family:sans-serif;background:#fafafa;color:#222;margin:0}\
         .container{max-width:960px;margin:2em auto;padding:1em 2em;background:#fff;border-top:4px solid #ef4444}\
         h1{color:#ef4444}.message{font-size:1.2em}\
         .error-block{padding:.5em;margin:.5em 0;background:#fef3c7;border-left:3px solid #eab308}\
         table.backtrace{border-collapse:collapse;width:100%}\
         table.backtrace td,table.backtrace th{border-bottom:1px solid #eee;padding:.25em;text-align:left}"
    }
}

impl ViewRenderer for HtmlViews {
    fn render(&self, template: &str, payload: &ReportPayload) -> Result<String, RenderError> {
        match template {
            FATAL_VIEW => Ok(self.render_fatal(payload)),
            ERROR_VIEW => Ok(Self::inline_block(&payload.record)),
            JSON_VIEW => Ok(serde_json::to_string_pretty(payload)?),
            other => Err(RenderError::TemplateNotFound(other.to_string())),
        }
    }
}

/// Escape HTML special characters.
pub(crate) fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
