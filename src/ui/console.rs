//! Interactive output channel for terminal sessions.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::ui::colors::{Color, Theme};

/// Interactive output channel used when running in a terminal.
pub trait Console: Send + Sync {
    /// Write one line of text.
    fn write(&self, text: &str);

    /// Paint `text` with `color`.
    fn colorize(&self, text: &str, color: Color) -> String;
}

/// Console writing to standard output with 24-bit colors.
#[derive(Debug)]
pub struct TerminalConsole {
    /// Color theme for terminal output
    theme: Theme,
    /// Whether colors are enabled (respects NO_COLOR env var)
    colors_enabled: bool,
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalConsole {
    /// Create a console with the default theme.
    pub fn new() -> Self {
        Self::with_theme(Theme::default())
    }

    /// Create a console with a custom theme.
    pub fn with_theme(theme: Theme) -> Self {
        Self {
            theme,
            colors_enabled: Self::detect_color_support(),
        }
    }

    /// Get the current theme.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Check if colors are enabled.
    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    /// Enable or disable colors.
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.colors_enabled = enabled;
        self
    }

    /// Respects the NO_COLOR environment variable.
    fn detect_color_support() -> bool {
        std::env::var("NO_COLOR").is_err()
    }
}

impl Console for TerminalConsole {
    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{text}").and_then(|()| stdout.flush()) {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.colors_enabled {
            text.color(self.theme.rgb(color)).to_string()
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_disabled_is_identity() {
        let console = TerminalConsole::new().with_colors(false);
        assert_eq!(console.colorize("Error - x", Color::Red), "Error - x");
    }

    #[test]
    fn test_colorize_enabled_wraps_in_escape_codes() {
        let console = TerminalConsole::new().with_colors(true);
        let painted = console.colorize("Error - x", Color::Red);

        assert!(painted.contains("Error - x"));
        assert!(painted.starts_with("\u{1b}["));
        assert!(painted.contains("239;68;68"));
    }

    #[test]
    fn test_custom_theme_paints_with_its_red() {
        let theme = Theme {
            error: owo_colors::Rgb(200, 0, 0),
        };
        let console = TerminalConsole::with_theme(theme).with_colors(true);

        assert!(console.colors_enabled());
        assert_eq!(console.theme().error, owo_colors::Rgb(200, 0, 0));
        assert!(console.colorize("Error - x", Color::Red).contains("200;0;0"));
    }
}
